//! Notification events and their plain-text rendering.

use crate::referral::Priority;

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientRole {
    Parent,
    Counselor,
    HouseManager,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientRole::Parent => "parent",
            RecipientRole::Counselor => "counselor",
            RecipientRole::HouseManager => "house manager",
        }
    }
}

/// A notification recipient. Channels without an address are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub role: RecipientRole,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    pub fn new(role: RecipientRole) -> Self {
        Self {
            role,
            name: None,
            email: None,
            phone: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: Option<String>) -> Self {
        self.email = email.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone.filter(|p| !p.trim().is_empty());
        self
    }

    /// Log-safe description: role and name, never the address.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.role.as_str(), name),
            None => self.role.as_str().to_string(),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Parent is asked to sign the digital consent form.
    ConsentRequested { consent_url: String },
    /// Counselor confirmation of a new referral.
    ReferralCreated { next_url: String },
    /// Parent signed; counselor may fill in the student form.
    ConsentSigned { student_form_url: String },
    /// Student data accepted without any consent proof on file.
    MissingConsentProof { school_name: String },
    ReferralCompleted {
        student_name: String,
        priority: Priority,
    },
}

/// A notification event for one referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub referral_number: String,
    pub organization: String,
    pub kind: EventKind,
}

impl NotificationEvent {
    pub fn new(
        referral_number: impl Into<String>,
        organization: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            referral_number: referral_number.into(),
            organization: organization.into(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::ConsentRequested { .. } => "consent_requested",
            EventKind::ReferralCreated { .. } => "referral_created",
            EventKind::ConsentSigned { .. } => "consent_signed",
            EventKind::MissingConsentProof { .. } => "missing_consent_proof",
            EventKind::ReferralCompleted { .. } => "referral_completed",
        }
    }

    pub fn subject(&self) -> String {
        let topic = match &self.kind {
            EventKind::ConsentRequested { .. } => "Parental consent requested",
            EventKind::ReferralCreated { .. } => "Referral received",
            EventKind::ConsentSigned { .. } => "Consent signed",
            EventKind::MissingConsentProof { .. } => "Warning: consent proof missing",
            EventKind::ReferralCompleted { .. } => "Referral completed",
        };
        format!("[{}] {} - {}", self.organization, topic, self.referral_number)
    }

    /// Email body.
    pub fn body(&self) -> String {
        let detail = match &self.kind {
            EventKind::ConsentRequested { consent_url } => format!(
                "A school counselor has referred your child to {}. \
                 Please review and sign the consent form:\n{}",
                self.organization, consent_url
            ),
            EventKind::ReferralCreated { next_url } => {
                format!("Your referral was received. Next step:\n{}", next_url)
            }
            EventKind::ConsentSigned { student_form_url } => format!(
                "The parent signed the consent form. Please complete the student details:\n{}",
                student_form_url
            ),
            EventKind::MissingConsentProof { school_name } => format!(
                "Student data was submitted by {} without an uploaded consent proof. \
                 Please collect the signed consent before intake.",
                school_name
            ),
            EventKind::ReferralCompleted {
                student_name,
                priority,
            } => format!(
                "Student details for {} were submitted. Priority: {}.",
                student_name, priority
            ),
        };
        format!("Referral {}\n\n{}", self.referral_number, detail)
    }

    /// Short SMS text.
    pub fn sms_text(&self) -> String {
        match &self.kind {
            EventKind::ConsentRequested { consent_url } => format!(
                "{}: please sign the consent form for referral {}: {}",
                self.organization, self.referral_number, consent_url
            ),
            EventKind::ReferralCreated { next_url } => format!(
                "Referral {} received. Next step: {}",
                self.referral_number, next_url
            ),
            EventKind::ConsentSigned { student_form_url } => format!(
                "Consent signed for {}. Student form: {}",
                self.referral_number, student_form_url
            ),
            EventKind::MissingConsentProof { .. } => format!(
                "Referral {} completed without consent proof.",
                self.referral_number
            ),
            EventKind::ReferralCompleted { priority, .. } => format!(
                "Referral {} completed. Priority: {}.",
                self.referral_number, priority
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering_carries_link_and_branding() {
        let event = NotificationEvent::new(
            "REF-202501-0001",
            "North House",
            EventKind::ConsentRequested {
                consent_url: "https://intake.example.org/consent/REF-202501-0001".to_string(),
            },
        );
        assert_eq!(event.name(), "consent_requested");
        assert!(event.subject().starts_with("[North House]"));
        assert!(event
            .body()
            .contains("https://intake.example.org/consent/REF-202501-0001"));
        assert!(event.sms_text().contains("REF-202501-0001"));
    }

    #[test]
    fn test_recipient_drops_blank_addresses() {
        let recipient = Recipient::new(RecipientRole::Parent)
            .email(Some(" ".to_string()))
            .phone(Some("0521112222".to_string()));
        assert!(recipient.email.is_none());
        assert!(recipient.phone.is_some());
        assert_eq!(recipient.describe(), "parent");
    }
}
