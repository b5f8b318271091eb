//! Public links handed to parents and counselors.

/// Builds the consent and student-form URLs for a referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn consent_url(&self, referral_number: &str) -> String {
        format!("{}/consent/{}", self.base_url, referral_number)
    }

    pub fn student_form_url(&self, referral_number: &str) -> String {
        format!("{}/student/{}", self.base_url, referral_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_ignore_trailing_slash() {
        let links = LinkBuilder::new("https://intake.example.org/");
        assert_eq!(
            links.consent_url("REF-202501-0001"),
            "https://intake.example.org/consent/REF-202501-0001"
        );
        assert_eq!(
            links.student_form_url("REF-202501-0001"),
            "https://intake.example.org/student/REF-202501-0001"
        );
    }
}
