//! Mapping between the local referral aggregate and CRM case fields.
//!
//! The CRM rejects `null` for several text fields, so absent optional values
//! are sent as empty strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::referral::{
    ConsentMethod, CounselorContact, ParentContact, Priority, Referral, ReferralStatus,
    StudentDetails,
};

pub const FIELD_REFERRAL_NUMBER: &str = "Referral_Number__c";
pub const FIELD_STATUS: &str = "Status__c";
pub const FIELD_CONSENT_METHOD: &str = "Consent_Method__c";
pub const FIELD_COUNSELOR_NAME: &str = "Counselor_Name__c";
pub const FIELD_COUNSELOR_EMAIL: &str = "Counselor_Email__c";
pub const FIELD_COUNSELOR_MOBILE: &str = "Counselor_Mobile__c";
pub const FIELD_SCHOOL_NAME: &str = "School_Name__c";
pub const FIELD_PARENT_EMAIL: &str = "Parent_Email__c";
pub const FIELD_PARENT_PHONE: &str = "Parent_Phone__c";
pub const FIELD_DESTINATION: &str = "Destination__c";
pub const FIELD_CONSENT_SIGNED: &str = "Consent_Signed__c";
pub const FIELD_CONSENT_DATE: &str = "Consent_Date__c";
pub const FIELD_PARENT_NAMES: &str = "Parent_Names__c";
pub const FIELD_STUDENT_FIRST_NAME: &str = "Student_First_Name__c";
pub const FIELD_STUDENT_LAST_NAME: &str = "Student_Last_Name__c";
pub const FIELD_DATE_OF_BIRTH: &str = "Date_Of_Birth__c";
pub const FIELD_GRADE: &str = "Grade__c";
pub const FIELD_RISK_LEVEL: &str = "Risk_Level__c";
pub const FIELD_PRIORITY: &str = "Priority__c";
pub const FIELD_NOTES: &str = "Notes__c";
pub const FIELD_CONSENT_PROOF_MISSING: &str = "Consent_Proof_Missing__c";

/// Payload of `create_case`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCase {
    pub referral_number: String,
    pub status: ReferralStatus,
    pub consent_method: ConsentMethod,
    pub counselor: CounselorContact,
    pub parent: ParentContact,
    pub destination: Option<String>,
}

impl From<&Referral> for NewCase {
    fn from(referral: &Referral) -> Self {
        Self {
            referral_number: referral.referral_number.clone(),
            status: referral.status,
            consent_method: referral.consent_method,
            counselor: referral.counselor.clone(),
            parent: referral.parent.clone(),
            destination: referral.destination.clone(),
        }
    }
}

impl NewCase {
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        put_text(&mut fields, FIELD_REFERRAL_NUMBER, &self.referral_number);
        put_text(&mut fields, FIELD_STATUS, self.status.as_str());
        put_text(&mut fields, FIELD_CONSENT_METHOD, self.consent_method.as_str());
        put_text(&mut fields, FIELD_COUNSELOR_NAME, &self.counselor.name);
        put_text(&mut fields, FIELD_COUNSELOR_EMAIL, &self.counselor.email);
        put_text(&mut fields, FIELD_COUNSELOR_MOBILE, &self.counselor.mobile);
        put_text(&mut fields, FIELD_SCHOOL_NAME, &self.counselor.school_name);
        put_optional(&mut fields, FIELD_PARENT_EMAIL, self.parent.email.as_deref());
        put_optional(&mut fields, FIELD_PARENT_PHONE, self.parent.phone.as_deref());
        put_optional(&mut fields, FIELD_DESTINATION, self.destination.as_deref());
        fields
    }
}

/// Payload of `update_consent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentUpdate {
    pub status: ReferralStatus,
    pub parent_names: Vec<String>,
    pub consented_at: DateTime<Utc>,
}

impl ConsentUpdate {
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        put_text(&mut fields, FIELD_STATUS, self.status.as_str());
        fields.insert(FIELD_CONSENT_SIGNED.to_string(), Value::Bool(true));
        put_text(
            &mut fields,
            FIELD_CONSENT_DATE,
            &self.consented_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        put_text(&mut fields, FIELD_PARENT_NAMES, &self.parent_names.join("; "));
        fields
    }
}

/// Payload of `update_student_data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentDataUpdate {
    pub status: ReferralStatus,
    pub student: StudentDetails,
    pub priority: Priority,
    pub consent_proof_missing: bool,
}

impl StudentDataUpdate {
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        put_text(&mut fields, FIELD_STATUS, self.status.as_str());
        put_text(&mut fields, FIELD_STUDENT_FIRST_NAME, &self.student.first_name);
        put_text(&mut fields, FIELD_STUDENT_LAST_NAME, &self.student.last_name);
        put_optional(
            &mut fields,
            FIELD_DATE_OF_BIRTH,
            self.student.date_of_birth.as_deref(),
        );
        put_optional(&mut fields, FIELD_GRADE, self.student.grade.as_deref());
        fields.insert(
            FIELD_RISK_LEVEL.to_string(),
            Value::from(self.student.risk_level),
        );
        put_text(&mut fields, FIELD_PRIORITY, self.priority.as_str());
        put_optional(&mut fields, FIELD_NOTES, self.student.notes.as_deref());
        fields.insert(
            FIELD_CONSENT_PROOF_MISSING.to_string(),
            Value::Bool(self.consent_proof_missing),
        );
        fields
    }
}

fn put_text(fields: &mut Map<String, Value>, name: &str, value: &str) {
    fields.insert(name.to_string(), Value::String(value.to_string()));
}

fn put_optional(fields: &mut Map<String, Value>, name: &str, value: Option<&str>) {
    put_text(fields, name, value.unwrap_or_default());
}
