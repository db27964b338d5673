use crate::authn::options::RelyingParty;

#[derive(Debug, Clone)]
pub struct UvPrompt {
    pub title: String,
    pub description: String,
}

pub(crate) fn enroll_prompt(rp: &RelyingParty, label: &str) -> UvPrompt {
    UvPrompt {
        title: "biokey".to_string(),
        description: format!(
            "Create wallet passkey\n\nSite: {} ({})\nAccount: {label}\n\nPress Confirm to create, or Deny to cancel.",
            rp.name, rp.id
        ),
    }
}

pub(crate) fn assert_prompt(rp_id: &str, user_display: &str) -> UvPrompt {
    UvPrompt {
        title: "biokey".to_string(),
        description: format!(
            "Unlock wallet key\n\nSite: {rp_id}\nAccount: {user_display}\n\nPress Confirm to unlock, or Deny to cancel."
        ),
    }
}
