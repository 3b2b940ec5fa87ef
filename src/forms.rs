use std::collections::BTreeMap;

use rocket::form::error::ErrorKind;
use rocket::form::{self, Context, FromForm};
use rocket::fs::TempFile;
use rocket::serde::Serialize;
use validator::ValidateEmail;

use crate::models::TodoFields;

pub const REQUIRED: &str = "This field is required.";

fn required<'v>(value: &str) -> form::Result<'v, ()> {
    if value.trim().is_empty() {
        Err(form::Error::validation(REQUIRED))?;
    }
    Ok(())
}

fn required_max<'v>(value: &str, max: usize) -> form::Result<'v, ()> {
    required(value)?;
    let len = value.trim().chars().count();
    if len > max {
        Err(form::Error::validation(format!(
            "Ensure this value has at most {} characters (it has {}).",
            max, len
        )))?;
    }
    Ok(())
}

fn email_address<'v>(value: &str) -> form::Result<'v, ()> {
    required_max(value, 254)?;
    if !value.trim().to_owned().validate_email() {
        Err(form::Error::validation("Enter a valid email address."))?;
    }
    Ok(())
}

fn confirms<'v>(value: &str, original: &str, mismatch: &'static str) -> form::Result<'v, ()> {
    required(value)?;
    if value != original {
        Err(form::Error::validation(mismatch))?;
    }
    Ok(())
}

fn image_upload<'v>(upload: &Option<TempFile<'_>>) -> form::Result<'v, ()> {
    if let Some(file) = upload.as_ref().filter(|file| file.len() > 0) {
        let is_image = file
            .content_type()
            .map_or(false, |ct| ct.top().as_str().eq_ignore_ascii_case("image"));
        if !is_image {
            Err(form::Error::validation(
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            ))?;
        }
    }
    Ok(())
}

#[derive(Debug, FromForm)]
pub struct TodoForm<'r> {
    #[field(validate = required_max(100))]
    pub title: String,
    #[field(validate = required())]
    pub description: String,
    #[field(validate = required_max(50))]
    pub priority: String,
    #[field(name = "dueDate", validate = required_max(50))]
    pub due_date: String,
    pub file: Option<TempFile<'r>>,
    #[field(validate = image_upload())]
    pub image: Option<TempFile<'r>>,
    // Checkboxes; an unchecked box is simply absent.
    pub file_clear: bool,
    pub image_clear: bool,
}

impl TodoForm<'_> {
    pub const FIELDS: &'static [&'static str] = &["title", "description", "priority", "dueDate", "file", "image"];

    pub fn fields(&self) -> TodoFields {
        TodoFields {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority.trim().to_string(),
            due_date: self.due_date.trim().to_string(),
        }
    }
}

#[derive(Debug, FromForm)]
pub struct LoginForm {
    #[field(validate = required_max(150))]
    pub username: String,
    #[field(validate = required())]
    pub password: String,
}

impl LoginForm {
    pub const FIELDS: &'static [&'static str] = &["username", "password"];
    pub const SECRET: &'static [&'static str] = &["password"];
}

#[derive(Debug, FromForm)]
pub struct RegistrationForm {
    #[field(validate = required_max(150))]
    pub username: String,
    #[field(validate = email_address())]
    pub email: String,
    #[field(validate = required())]
    pub password1: String,
    #[field(validate = confirms(&self.password1, "Passwords don't match"))]
    pub password2: String,
}

impl RegistrationForm {
    pub const FIELDS: &'static [&'static str] = &["username", "email", "password1", "password2"];
    pub const SECRET: &'static [&'static str] = &["password1", "password2"];
}

#[derive(Debug, FromForm)]
pub struct PasswordChangeForm {
    #[field(validate = email_address())]
    pub email: String,
    #[field(validate = required())]
    pub old_password: String,
    #[field(validate = required())]
    pub new_password: String,
    #[field(validate = confirms(&self.new_password, "New passwords do not match"))]
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub const FIELDS: &'static [&'static str] = &["email", "old_password", "new_password", "confirm_password"];
    pub const SECRET: &'static [&'static str] = &["old_password", "new_password", "confirm_password"];
}

#[derive(Debug, FromForm)]
pub struct PasswordResetForm {
    #[field(validate = email_address())]
    pub email: String,
    #[field(name = "newPassword", validate = required())]
    pub new_password: String,
}

impl PasswordResetForm {
    pub const FIELDS: &'static [&'static str] = &["email", "newPassword"];
    pub const SECRET: &'static [&'static str] = &["newPassword"];
}

/// What a template needs to redisplay a form: echoed values, per-field
/// errors and errors that belong to no single field. Every listed field
/// has an entry in both maps so templates never hit an undefined key.
#[derive(Debug, Default, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct FormView {
    pub values: BTreeMap<String, String>,
    pub errors: BTreeMap<String, Vec<String>>,
    pub form_errors: Vec<String>,
}

impl FormView {
    pub fn new(fields: &[&str]) -> Self {
        FormView {
            values: fields.iter().map(|f| (f.to_string(), String::new())).collect(),
            errors: fields.iter().map(|f| (f.to_string(), Vec::new())).collect(),
            form_errors: Vec::new(),
        }
    }

    /// Rebuilds the view from a failed submission. Values of `secret`
    /// fields are never echoed back.
    pub fn from_context(context: &Context<'_>, fields: &[&str], secret: &[&str]) -> Self {
        let mut view = FormView::new(fields);

        for field in fields {
            if !secret.contains(field) {
                if let Some(value) = context.field_value(*field) {
                    view.values.insert(field.to_string(), value.to_string());
                }
            }
        }

        for error in context.errors() {
            let message = match error.kind {
                ErrorKind::Missing => REQUIRED.to_string(),
                _ => error.to_string(),
            };
            match error.name.as_ref().map(|name| name.to_string()) {
                Some(name) if view.errors.contains_key(&name) => {
                    view.errors.entry(name).or_default().push(message);
                }
                _ => view.form_errors.push(message),
            }
        }

        view
    }

    pub fn with_value(mut self, field: &str, value: impl Into<String>) -> Self {
        self.values.insert(field.to_string(), value.into());
        self
    }

    pub fn with_form_error(mut self, message: impl Into<String>) -> Self {
        self.form_errors.push(message.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.form_errors.is_empty() || self.errors.values().any(|errors| !errors.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::form::Form;

    #[test]
    fn blank_view_has_every_key() {
        let view = FormView::new(LoginForm::FIELDS);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["values"]["username"], "");
        assert_eq!(json["errors"]["password"], serde_json::json!([]));
        assert!(!view.has_errors());
    }

    #[test]
    fn registration_requires_matching_passwords() {
        let ok = Form::<RegistrationForm>::parse(
            "username=alice&email=alice@example.com&password1=pw&password2=pw",
        );
        assert!(ok.is_ok());

        let mismatch = Form::<RegistrationForm>::parse(
            "username=alice&email=alice@example.com&password1=pw&password2=other",
        );
        let errors = mismatch.unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("Passwords don't match")));
    }

    #[test]
    fn registration_rejects_bad_email_and_blank_username() {
        let result = Form::<RegistrationForm>::parse(
            "username=&email=not-an-email&password1=pw&password2=pw",
        );
        let errors = result.unwrap_err();
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(messages.iter().any(|m| m == REQUIRED));
        assert!(messages.iter().any(|m| m == "Enter a valid email address."));
    }

    #[test]
    fn login_enforces_username_length() {
        let long_name = "a".repeat(151);
        let body = format!("username={}&password=pw", long_name);
        let result = Form::<LoginForm>::parse(&body);
        assert!(result.is_err());
        assert!(Form::<LoginForm>::parse("username=bob&password=").is_err());
    }

    #[test]
    fn password_change_flags_mismatched_confirmation() {
        let result = Form::<PasswordChangeForm>::parse(
            "email=a@example.com&old_password=x&new_password=y&confirm_password=z",
        );
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.to_string() == "New passwords do not match"));
    }

    #[test]
    fn reset_form_reads_camel_case_field() {
        let form = Form::<PasswordResetForm>::parse("email=a@example.com&newPassword=fresh").unwrap();
        assert_eq!(form.new_password, "fresh");
    }
}
