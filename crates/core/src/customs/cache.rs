use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::customs::{CustomsError, CustomsInferencer, CustomsRequest};
use crate::domain::customs::CustomsDeclaration;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    contents: String,
    weight_bits: u64,
    declared_value: Option<String>,
    compliance_code: Option<String>,
}

impl From<&CustomsRequest> for CacheKey {
    fn from(request: &CustomsRequest) -> Self {
        Self {
            contents: request.contents.trim().to_string(),
            weight_bits: request.weight_oz.to_bits(),
            declared_value: request.declared_value.map(|value| value.normalize().to_string()),
            compliance_code: request
                .compliance_code
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string),
        }
    }
}

/// Memo of successful inferences for one batch run.
///
/// Failures are never stored. Two tasks racing on the same key both infer;
/// the result is identical so the last write wins harmlessly.
#[derive(Debug, Default)]
pub struct CustomsCache {
    entries: Mutex<HashMap<CacheKey, CustomsDeclaration>>,
}

impl CustomsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_infer(
        &self,
        inferencer: &CustomsInferencer,
        request: &CustomsRequest,
    ) -> Result<CustomsDeclaration, CustomsError> {
        let key = CacheKey::from(request);
        if let Some(hit) = self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(hit.clone());
        }

        let declaration = inferencer.infer(request)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, declaration.clone());
        Ok(declaration)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
