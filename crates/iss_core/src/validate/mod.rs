use serde::{Deserialize, Serialize};

use crate::domain::{NewService, NewTicket, Priority, ResolveTicket};
use crate::error::AppError;

pub const MIN_CRITICALITY: i64 = 1;
pub const MAX_CRITICALITY: i64 = 5;

/// A service reference as sent by clients: a JSON number, or the string value of a form select.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServiceRef {
    Id(i64),
    Text(String),
}

impl From<i64> for ServiceRef {
    fn from(id: i64) -> Self {
        ServiceRef::Id(id)
    }
}

fn resolve_service_ref(value: Option<&ServiceRef>) -> Result<i64, AppError> {
    match value {
        Some(ServiceRef::Id(id)) => Ok(*id),
        Some(ServiceRef::Text(raw)) if !raw.trim().is_empty() => {
            raw.trim().parse::<i64>().map_err(|_| {
                AppError::new(
                    "VALIDATION_INVALID_SERVICE_ID",
                    "service_id must be an integer",
                )
                .with_details(format!("value={raw}"))
            })
        }
        _ => Err(AppError::new(
            "VALIDATION_MISSING_FIELD",
            "Missing required field: service_id",
        )),
    }
}

/// Ticket submission as received from a client, before validation.
///
/// Every field is optional here so that missing values surface as explicit validation errors
/// instead of deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub service_id: Option<ServiceRef>,
    pub priority: Option<String>,
}

fn required_text(field: &str, value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::new(
            "VALIDATION_MISSING_FIELD",
            format!("Missing required field: {field}"),
        )),
    }
}

/// Validate a ticket draft into a `NewTicket`.
///
/// Rules:
/// - `service_id` (integer or numeric string) and a non-blank `title` are required.
/// - `priority` must be one of the known labels; omitted means `Medium`.
/// - `description` is optional and stored as an empty string when omitted.
pub fn validate_ticket_draft(draft: &TicketDraft) -> Result<NewTicket, AppError> {
    let service_id = resolve_service_ref(draft.service_id.as_ref())?;
    let title = required_text("title", draft.title.as_deref())?;

    let priority = match draft.priority.as_deref().map(str::trim) {
        None | Some("") => Priority::default(),
        Some(raw) => raw.parse::<Priority>()?,
    };

    Ok(NewTicket {
        title,
        description: draft
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        service_id,
        priority,
    })
}

pub fn validate_new_service(service: &NewService) -> Result<(), AppError> {
    required_text("name", Some(&service.name))?;
    required_text("category", Some(&service.category))?;

    if !(MIN_CRITICALITY..=MAX_CRITICALITY).contains(&service.criticality_score) {
        return Err(AppError::new(
            "VALIDATION_CRITICALITY_OUT_OF_RANGE",
            format!("criticality_score must be between {MIN_CRITICALITY} and {MAX_CRITICALITY}"),
        )
        .with_details(format!("value={}", service.criticality_score)));
    }
    if service.user_count_estimate < 0 {
        return Err(AppError::new(
            "VALIDATION_NEGATIVE_USER_COUNT",
            "user_count_estimate must not be negative",
        )
        .with_details(format!("value={}", service.user_count_estimate)));
    }
    Ok(())
}

pub fn validate_resolution(resolution: &ResolveTicket) -> Result<(), AppError> {
    required_text("root_cause", Some(&resolution.root_cause))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> TicketDraft {
        TicketDraft {
            title: Some("  VPN down ".to_string()),
            description: None,
            service_id: Some(7.into()),
            priority: Some("High".to_string()),
        }
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let t = validate_ticket_draft(&draft()).unwrap();
        assert_eq!(t.title, "VPN down");
        assert_eq!(t.description, "");
        assert_eq!(t.priority, Priority::High);
    }

    #[test]
    fn missing_service_id_is_rejected() {
        let mut d = draft();
        d.service_id = None;
        let err = validate_ticket_draft(&d).unwrap_err();
        assert_eq!(err.code, "VALIDATION_MISSING_FIELD");
        assert!(err.message.contains("service_id"));
    }

    #[test]
    fn service_id_accepts_numeric_strings() {
        let mut d = draft();
        d.service_id = Some(ServiceRef::Text(" 12 ".to_string()));
        assert_eq!(validate_ticket_draft(&d).unwrap().service_id, 12);

        d.service_id = Some(ServiceRef::Text("".to_string()));
        assert_eq!(
            validate_ticket_draft(&d).unwrap_err().code,
            "VALIDATION_MISSING_FIELD"
        );

        d.service_id = Some(ServiceRef::Text("vpn".to_string()));
        assert_eq!(
            validate_ticket_draft(&d).unwrap_err().code,
            "VALIDATION_INVALID_SERVICE_ID"
        );
    }

    #[test]
    fn draft_deserializes_either_service_id_shape() {
        let a: TicketDraft = serde_json::from_str(r#"{"title":"x","service_id":2}"#).unwrap();
        let b: TicketDraft = serde_json::from_str(r#"{"title":"x","service_id":"2"}"#).unwrap();
        assert_eq!(a.service_id, Some(ServiceRef::Id(2)));
        assert_eq!(b.service_id, Some(ServiceRef::Text("2".to_string())));
    }

    #[test]
    fn omitted_priority_defaults_to_medium() {
        let mut d = draft();
        d.priority = None;
        assert_eq!(validate_ticket_draft(&d).unwrap().priority, Priority::Medium);
    }

    #[test]
    fn service_bounds_are_checked() {
        let mut s = NewService {
            name: "Mail".to_string(),
            category: "Communication".to_string(),
            criticality_score: 6,
            user_count_estimate: 10,
        };
        assert_eq!(
            validate_new_service(&s).unwrap_err().code,
            "VALIDATION_CRITICALITY_OUT_OF_RANGE"
        );
        s.criticality_score = 3;
        s.user_count_estimate = -1;
        assert_eq!(
            validate_new_service(&s).unwrap_err().code,
            "VALIDATION_NEGATIVE_USER_COUNT"
        );
    }
}
