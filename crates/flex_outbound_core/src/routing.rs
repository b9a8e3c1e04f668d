use crate::resources::{FlexFlow, TASK_INTEGRATION_TYPE};

/// Picks the task-integrated Flex Flow bound to `from_number`.
///
/// A number can carry several flows (one per integration type); only the
/// `task` one routes to an agent. The first match in platform order wins.
pub fn select_flex_flow<'a>(flows: &'a [FlexFlow], from_number: &str) -> Option<&'a FlexFlow> {
    flows.iter().find(|flow| {
        flow.integration_type.as_deref() == Some(TASK_INTEGRATION_TYPE)
            && flow.contact_identity.as_deref() == Some(from_number)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(sid: &str, integration_type: &str, contact_identity: &str) -> FlexFlow {
        FlexFlow {
            sid: sid.to_string(),
            integration_type: Some(integration_type.to_string()),
            contact_identity: Some(contact_identity.to_string()),
            chat_service_sid: Some("IS1".to_string()),
            ..FlexFlow::default()
        }
    }

    #[test]
    fn ignores_non_task_integrations_for_the_same_number() {
        let flows = vec![
            flow("FO1", "studio", "+15551230000"),
            flow("FO2", "task", "+15551230000"),
        ];
        let selected = select_flex_flow(&flows, "+15551230000").expect("should match");
        assert_eq!(selected.sid, "FO2");
    }

    #[test]
    fn first_match_wins() {
        let flows = vec![
            flow("FO1", "task", "+15551230000"),
            flow("FO2", "task", "+15551230000"),
        ];
        assert_eq!(
            select_flex_flow(&flows, "+15551230000").map(|flow| flow.sid.as_str()),
            Some("FO1")
        );
    }

    #[test]
    fn returns_none_for_unknown_number() {
        let flows = vec![flow("FO1", "task", "+15551230000")];
        assert!(select_flex_flow(&flows, "+15550000000").is_none());
    }
}
