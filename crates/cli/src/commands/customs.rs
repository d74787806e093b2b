use bulkship_core::config::LoadOptions;
use bulkship_core::customs::{CustomsError, CustomsInferencer, CustomsRequest};
use rust_decimal::Decimal;

use crate::commands::{load_config, CommandResult, EXIT_COMPLIANCE, EXIT_INPUT, EXIT_OK};

#[derive(Clone, Debug)]
pub struct CustomsArgs {
    pub contents: String,
    pub weight_oz: f64,
    pub declared_value: Option<Decimal>,
    pub compliance_code: Option<String>,
}

/// Shows the declaration the engine would file for one contents description.
pub fn run(options: &LoadOptions, args: CustomsArgs) -> CommandResult {
    let config = match load_config("customs", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let mut request = CustomsRequest::new(args.contents, args.weight_oz);
    request.declared_value = args.declared_value;
    request.compliance_code = args.compliance_code;

    match CustomsInferencer::new(config.customs).infer(&request) {
        Ok(declaration) => {
            let message = format!(
                "{} item(s), declared value ${}, compliance code `{}`",
                declaration.items.len(),
                declaration.total_value(),
                declaration.compliance.code
            );
            CommandResult::report("customs", message, &declaration, EXIT_OK)
        }
        Err(error @ CustomsError::ComplianceCodeRequired { .. }) => {
            CommandResult::failure("customs", "compliance", error.to_string(), EXIT_COMPLIANCE)
        }
        Err(error @ CustomsError::MissingContents) => {
            CommandResult::failure("customs", "input_invalid", error.to_string(), EXIT_COMPLIANCE)
        }
        Err(error @ CustomsError::DeclaredValueOutOfRange) => {
            CommandResult::failure("customs", "input_invalid", error.to_string(), EXIT_INPUT)
        }
    }
}
