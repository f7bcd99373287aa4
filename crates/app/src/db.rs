use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Turns a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
///
/// Relative paths, including the `sqlite://relative.db` form, resolve against
/// the working directory. Query parameters are kept.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" {
        return trimmed.to_string();
    }

    let rest = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_str, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    match query {
        Some(query) => format!("sqlite://{}?{query}", absolute.display()),
        None => format!("sqlite://{}", absolute.display()),
    }
}

/// Creates the database file and its parent directories if missing.
pub fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid --db value: {db_url}");
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_full_urls_and_memory() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/x.db"),
            "sqlite:///tmp/x.db"
        );
    }

    #[test]
    fn absolutizes_relative_sqlite_urls() {
        let url = normalize_sqlite_url(crate::DEFAULT_DB_URL);
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            url,
            format!("sqlite://{}", cwd.join("courses.sqlite3").display())
        );

        let with_query = normalize_sqlite_url("sqlite://data/x.db?mode=rwc");
        assert!(with_query.starts_with("sqlite:///"));
        assert!(with_query.ends_with("data/x.db?mode=rwc"));
    }

    #[test]
    fn absolutizes_relative_paths() {
        let url = normalize_sqlite_url("sqlite:data/courses.sqlite3");
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/courses.sqlite3"));
    }

    #[test]
    fn prepares_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("db.sqlite3");
        let url = format!("sqlite://{}", file.display());
        prepare_sqlite_file(&url).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn rejects_non_sqlite_urls() {
        assert!(prepare_sqlite_file("postgres://nope").is_err());
    }
}
