//! Git repository URL helpers.

use url::Url;

use crate::{Error, Result};

/// Extract `<org>/<repo>` from a repository URL, dropping any `.git` suffix.
///
/// `https://github.com/my-org/gitops.git` becomes `my-org/gitops`.
pub fn org_repo_from_url(raw: &str) -> Result<String> {
    let segments = path_segments(raw)?;
    if segments.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "repository URL {raw} must have an organisation and a repository"
        )));
    }
    let org = &segments[segments.len() - 2];
    let repo = &segments[segments.len() - 1];
    Ok(format!("{org}/{repo}"))
}

/// Extract the repository name from a repository URL.
pub fn repo_from_url(raw: &str) -> Result<String> {
    path_segments(raw)?
        .pop()
        .ok_or_else(|| Error::InvalidInput(format!("repository URL {raw} has no path")))
}

fn path_segments(raw: &str) -> Result<Vec<String>> {
    let parsed = Url::parse(raw)
        .map_err(|e| Error::InvalidInput(format!("invalid repository URL {raw}: {e}")))?;

    let mut segments: Vec<String> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).map(String::from).collect())
        .unwrap_or_default();

    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = last.strip_suffix(".git") {
            *last = stripped.to_string();
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_repo_from_url() {
        let got = org_repo_from_url("https://github.com/my-org/gitops.git").unwrap();
        assert_eq!(got, "my-org/gitops");
    }

    #[test]
    fn test_org_repo_without_suffix() {
        let got = org_repo_from_url("https://gitlab.example.com/group/sub/app").unwrap();
        assert_eq!(got, "sub/app");
    }

    #[test]
    fn test_repo_from_url() {
        let got = repo_from_url("https://github.com/my-org/http-api.git").unwrap();
        assert_eq!(got, "http-api");
    }

    #[test]
    fn test_trailing_slash() {
        let got = repo_from_url("https://github.com/my-org/http-api/").unwrap();
        assert_eq!(got, "http-api");
    }

    #[test]
    fn test_invalid_urls() {
        assert!(matches!(
            org_repo_from_url("not a url"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            org_repo_from_url("https://github.com/only"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            repo_from_url("https://github.com/"),
            Err(Error::InvalidInput(_))
        ));
    }
}
