//! Job creation validation
//!
//! Checks a create request against the requirements its definition declares.
//! Every problem is collected so callers see the whole list at once.

use fundflow_core::domain::definition::JobDefinition;
use fundflow_core::dto::job::JobCreateModel;

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Returns the problems with one request, prefixed by its position in the batch
pub fn validate_create_model(
    index: usize,
    model: &JobCreateModel,
    definition: &JobDefinition,
) -> Vec<String> {
    let mut errors = Vec::new();
    let prefix = format!("Job {} ({})", index, definition.id);

    match &model.trigger {
        None => errors.push(format!("{}: trigger is required", prefix)),
        Some(trigger) if trigger.message.trim().is_empty() => {
            errors.push(format!("{}: trigger message is required", prefix))
        }
        Some(_) => {}
    }

    if definition.require_specification_id && is_blank(model.specification_id.as_deref()) {
        errors.push(format!("{}: specification id is required", prefix));
    }

    if definition.require_entity_id {
        let entity_id = model
            .trigger
            .as_ref()
            .and_then(|t| t.entity_id.as_deref());
        if is_blank(entity_id) {
            errors.push(format!("{}: trigger entity id is required", prefix));
        }
    }

    if definition.require_message_body && is_blank(model.message_body.as_deref()) {
        errors.push(format!("{}: message body is required", prefix));
    }

    for property in &definition.require_message_properties {
        if is_blank(model.properties.get(property).map(String::as_str)) {
            errors.push(format!("{}: message property '{}' is required", prefix, property));
        }
    }

    errors
}
