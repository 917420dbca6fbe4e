use crate::server::response::ApiError;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;
const MAX_SUBJECT_LEN: usize = 200;
const MAX_TOP_SUBJECTS: usize = 20;

pub fn validate_user_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name cannot exceed {MAX_NAME_LEN} characters"));
    }
    if name.chars().any(char::is_control) {
        return Err("Name cannot contain control characters".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(format!("Email cannot exceed {MAX_EMAIL_LEN} characters"));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err("Email must look like name@example.com".to_string()),
    }
}

/// Trims each subject and drops duplicates, keeping the first occurrence.
pub fn normalize_subjects(subjects: &[String]) -> Result<Vec<String>, ApiError> {
    if subjects.len() > MAX_TOP_SUBJECTS {
        return Err(ApiError::bad_request(format!(
            "At most {MAX_TOP_SUBJECTS} subjects are allowed"
        )));
    }

    let mut normalized: Vec<String> = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(ApiError::bad_request("Subjects cannot be empty"));
        }
        if subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(ApiError::bad_request(format!(
                "Subjects cannot exceed {MAX_SUBJECT_LEN} characters"
            )));
        }
        if !normalized.iter().any(|s| s == subject) {
            normalized.push(subject.to_string());
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_name() {
        assert!(validate_user_name("Ada Lovelace").is_ok());
        assert!(validate_user_name("   ").is_err());
        assert!(validate_user_name(&"a".repeat(101)).is_err());
        assert!(validate_user_name("bad\nname").is_err());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("ada @example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn test_normalize_subjects() {
        let subjects = vec![" Math ".to_string(), "Physics".to_string(), "Math".to_string()];
        assert_eq!(normalize_subjects(&subjects).unwrap(), vec!["Math", "Physics"]);

        assert!(normalize_subjects(&[" ".to_string()]).is_err());
        assert!(normalize_subjects(&vec!["x".to_string(); 21]).is_err());
        assert!(normalize_subjects(&[]).unwrap().is_empty());
    }
}
