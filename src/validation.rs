use crate::error::ApiError;
use crate::model::ProjectFields;

pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.len();
    if len < min || len > max {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Project and package names double as directory names under the
/// repository root, so they must be a single safe path component.
pub fn check_name(value: &str) -> Result<(), ApiError> {
    check_length("name", value, 1, 255)?;
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ApiError::BadRequest(
            "name must contain only alphanumeric characters, hyphens, underscores, or dots".into(),
        ));
    }
    if value == "." || value == ".." {
        return Err(ApiError::BadRequest("name must not be '.' or '..'".into()));
    }
    Ok(())
}

/// Repository URLs may be http(s), ssh or scp-style (`git@host:repo.git`),
/// so only the shape is checked here.
pub fn check_repo_url(value: &str) -> Result<(), ApiError> {
    check_length("url", value, 1, 2048)?;
    if value.starts_with('-') {
        return Err(ApiError::BadRequest("url must not start with '-'".into()));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest("url must not contain whitespace".into()));
    }
    Ok(())
}

pub fn check_branch_name(value: &str) -> Result<(), ApiError> {
    check_length("branch name", value, 1, 255)?;
    if value.contains("..") || value.contains('\0') {
        return Err(ApiError::BadRequest(
            "branch name must not contain '..' or null bytes".into(),
        ));
    }
    if value.starts_with('-') {
        return Err(ApiError::BadRequest(
            "branch name must not start with '-'".into(),
        ));
    }
    Ok(())
}

/// 0 none, 1 WeChat Work, 2 DingTalk, 3 Feishu, 255 custom callback.
pub fn check_notify_type(value: i16) -> Result<(), ApiError> {
    if matches!(value, 0..=3 | 255) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "notify type must be one of 0, 1, 2, 3, 255 (got {value})"
        )))
    }
}

/// Split a transfer-options string into arguments the way a POSIX shell
/// would for plain words: whitespace separates, single quotes are literal,
/// double quotes allow `\"` and `\\`, and a backslash outside quotes escapes
/// the next character.
pub fn parse_transfer_options(input: &str) -> Result<Vec<String>, ApiError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Single, c) => current.push(c),
            (Quote::Double, '\\') => match chars.next() {
                Some(next @ ('"' | '\\')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => break,
            },
            (Quote::Double, c) => current.push(c),
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_word = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_word = true;
            }
            (Quote::None, '\\') => {
                let next = chars.next().ok_or_else(|| {
                    ApiError::BadRequest("transfer options end with a dangling '\\'".into())
                })?;
                current.push(next);
                in_word = true;
            }
            (Quote::None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (Quote::None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote != Quote::None {
        return Err(ApiError::BadRequest(format!(
            "transfer options contain an unclosed quote: {input}"
        )));
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}

/// Everything checked before a project is written.
pub fn check_project_fields(fields: &ProjectFields) -> Result<(), ApiError> {
    check_name(&fields.name)?;
    check_repo_url(&fields.url)?;
    check_branch_name(&fields.branch)?;
    check_length("path", &fields.path, 0, 4096)?;
    check_length("notify target", &fields.notify_target, 0, 2048)?;
    check_notify_type(fields.notify_type)?;
    parse_transfer_options(&fields.transfer_options)?;
    Ok(())
}
