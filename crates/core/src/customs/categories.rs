use rust_decimal::Decimal;

/// Tariff and value estimate used when a description carries no price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub description: &'static str,
    pub tariff_code: &'static str,
    base_value_usd: i64,
    keywords: &'static [&'static str],
}

impl Category {
    pub fn base_value(&self) -> Decimal {
        Decimal::new(self.base_value_usd, 0)
    }

    fn matches(&self, words: &[String]) -> bool {
        words.iter().any(|word| self.keywords.contains(&word.as_str()))
    }
}

/// Denim jeans, the generic apparel line most shipments fall back to.
pub const DEFAULT_CATEGORY: Category = Category {
    name: "denim",
    description: "Jeans",
    tariff_code: "6203.42.4011",
    base_value_usd: 25,
    keywords: &["jeans", "denim"],
};

const CATEGORIES: &[Category] = &[
    Category {
        name: "electronics",
        description: "Electronics",
        tariff_code: "8517.62.0090",
        base_value_usd: 150,
        keywords: &[
            "electronics", "electronic", "phone", "phones", "laptop", "tablet", "camera",
            "cameras", "headphones", "earbuds", "charger", "cable", "cables", "speaker",
            "console",
        ],
    },
    Category {
        name: "apparel",
        description: "Clothing",
        tariff_code: "6109.10.0012",
        base_value_usd: 20,
        keywords: &[
            "shirt", "shirts", "tshirt", "tee", "tees", "dress", "dresses", "jacket", "hoodie",
            "sweater", "clothing", "clothes", "apparel", "pants", "skirt", "socks",
        ],
    },
    Category {
        name: "footwear",
        description: "Footwear",
        tariff_code: "6404.11.9020",
        base_value_usd: 60,
        keywords: &["shoe", "shoes", "sneaker", "sneakers", "boot", "boots", "sandals", "footwear"],
    },
    Category {
        name: "food",
        description: "Food products",
        tariff_code: "2106.90.9998",
        base_value_usd: 15,
        keywords: &["food", "snack", "snacks", "candy", "chocolate", "coffee", "tea", "cookies", "sauce"],
    },
    Category {
        name: "beauty",
        description: "Cosmetics",
        tariff_code: "3304.99.5000",
        base_value_usd: 25,
        keywords: &[
            "beauty", "cosmetic", "cosmetics", "makeup", "skincare", "lotion", "perfume", "shampoo",
            "soap",
        ],
    },
    Category {
        name: "sporting",
        description: "Sporting goods",
        tariff_code: "9506.99.6080",
        base_value_usd: 40,
        keywords: &["sport", "sports", "sporting", "ball", "racket", "golf", "yoga", "fitness", "helmet"],
    },
    Category {
        name: "books",
        description: "Books",
        tariff_code: "4901.99.0093",
        base_value_usd: 15,
        keywords: &["book", "books", "magazine", "magazines", "novel", "novels", "printed"],
    },
    Category {
        name: "toys",
        description: "Toys",
        tariff_code: "9503.00.0090",
        base_value_usd: 20,
        keywords: &["toy", "toys", "game", "games", "puzzle", "puzzles", "doll", "dolls", "lego"],
    },
    Category {
        name: "jewelry",
        description: "Jewelry",
        tariff_code: "7117.19.9000",
        base_value_usd: 50,
        keywords: &[
            "jewelry", "jewellery", "necklace", "ring", "rings", "bracelet", "earrings", "pendant",
        ],
    },
];

/// First category whose keywords appear in the text, else [`DEFAULT_CATEGORY`].
pub fn classify(text: &str) -> Category {
    let words: Vec<String> = text
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    CATEGORIES.iter().copied().find(|category| category.matches(&words)).unwrap_or(DEFAULT_CATEGORY)
}

#[cfg(test)]
mod tests {
    use super::{classify, DEFAULT_CATEGORY};

    #[test]
    fn keywords_pick_categories_in_table_order() {
        assert_eq!(classify("Used laptop and charger").name, "electronics");
        assert_eq!(classify("running SHOES").name, "footwear");
        // Electronics is checked before toys.
        assert_eq!(classify("game console").name, "electronics");
        assert_eq!(classify("earrings").name, "jewelry");
    }

    #[test]
    fn unknown_contents_fall_back_to_denim() {
        let category = classify("misc household stuff");
        assert_eq!(category, DEFAULT_CATEGORY);
        assert_eq!(category.tariff_code, "6203.42.4011");
        assert_eq!(category.base_value().to_string(), "25");
    }
}
