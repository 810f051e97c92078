//! Remote-path string handling shared by the connectors and the CLI tools.
//!
//! Remote paths always use `/` as the separator regardless of the local
//! platform, so these helpers work on strings rather than `std::path::Path`.

use anyhow::Context;

/// Normalize a remote path: the empty string becomes the root `/`, and
/// trailing slashes are stripped unless the path is exactly the root.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn is_root(path: &str) -> bool {
    normalize(path) == "/"
}

/// Last component of a path; the root's basename is `/` itself.
pub fn basename(path: &str) -> String {
    let path = normalize(path);
    if path == "/" {
        return path;
    }
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path,
    }
}

/// Parent directory of a path; the parent of the root (and of a bare name)
/// is the root.
pub fn parent(path: &str) -> String {
    let path = normalize(path);
    if path == "/" {
        return path;
    }
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Join a child name onto a base directory path.
pub fn join(base: &str, name: &str) -> String {
    let base = normalize(base);
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Position of `path` relative to `base`, without a leading slash; this is
/// what include/exclude patterns are matched against.
pub fn relative(base: &str, path: &str) -> String {
    let base = normalize(base);
    let path = normalize(path);
    if base == "/" {
        return path.trim_start_matches('/').to_string();
    }
    match path.strip_prefix(&base) {
        Some(rest) if rest.is_empty() => String::new(),
        Some(rest) if rest.starts_with('/') => rest[1..].to_string(),
        _ => path.trim_start_matches('/').to_string(),
    }
}

/// A parsed `[user@]host[:port]:path` remote endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Locator {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

pub fn parse_locator(input: &str) -> anyhow::Result<Locator> {
    // Regular expression for remote endpoints with named groups
    let re = regex::Regex::new(
        r"^(?:(?P<user>[^@]+)@)?(?P<host>(?:\[[^\]]+\]|[^:\[\]]+))(?::(?P<port>\d+))?:(?P<path>.+)$",
    )
    .unwrap();
    let captures = re.captures(input).ok_or_else(|| {
        anyhow::anyhow!(
            "cannot parse remote location '{}', expected [user@]host[:port]:path",
            input
        )
    })?;
    let user = captures.name("user").map(|m| m.as_str().to_string());
    let host = captures.name("host").unwrap().as_str().to_string();
    let port = match captures.name("port") {
        Some(m) => Some(
            m.as_str()
                .parse::<u16>()
                .with_context(|| format!("invalid port in remote location '{}'", input))?,
        ),
        None => None,
    };
    let path = captures.name("path").unwrap().as_str().to_string();
    Ok(Locator {
        user,
        host,
        port,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("///"), "/");
        assert_eq!(normalize("/data/"), "/data");
        assert_eq!(normalize("/data//"), "/data");
        assert_eq!(normalize("/data/in.csv"), "/data/in.csv");
        assert_eq!(normalize("data"), "data");
    }

    #[test]
    fn test_basename_and_parent() {
        assert_eq!(basename("/data/in.csv"), "in.csv");
        assert_eq!(basename("/data/"), "data");
        assert_eq!(basename("in.csv"), "in.csv");
        assert_eq!(basename("/"), "/");
        assert_eq!(parent("/data/in.csv"), "/data");
        assert_eq!(parent("/data"), "/");
        assert_eq!(parent("in.csv"), "/");
        assert_eq!(parent("/"), "/");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "data"), "/data");
        assert_eq!(join("/data", "in.csv"), "/data/in.csv");
        assert_eq!(join("/data/", "in.csv"), "/data/in.csv");
        assert_eq!(join("data", "in.csv"), "data/in.csv");
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative("/data", "/data/in.csv"), "in.csv");
        assert_eq!(relative("/data", "/data/sub/in.csv"), "sub/in.csv");
        assert_eq!(relative("/data", "/data"), "");
        assert_eq!(relative("/", "/data/in.csv"), "data/in.csv");
        // sibling with a shared name prefix is not a prefix match
        assert_eq!(relative("/data", "/database/x"), "database/x");
    }

    #[test]
    fn test_parse_locator_basic() {
        let locator = parse_locator("host:/path/to/file").unwrap();
        assert_eq!(locator.user, None);
        assert_eq!(locator.host, "host");
        assert_eq!(locator.port, None);
        assert_eq!(locator.path, "/path/to/file");
    }

    #[test]
    fn test_parse_locator_full() {
        let locator = parse_locator("user@host:2121:/path/to/file").unwrap();
        assert_eq!(locator.user, Some("user".to_string()));
        assert_eq!(locator.host, "host");
        assert_eq!(locator.port, Some(2121));
        assert_eq!(locator.path, "/path/to/file");
    }

    #[test]
    fn test_parse_locator_ipv6() {
        let locator = parse_locator("[2001:db8::1]:/path/to/file").unwrap();
        assert_eq!(locator.user, None);
        assert_eq!(locator.host, "[2001:db8::1]");
        assert_eq!(locator.port, None);
        assert_eq!(locator.path, "/path/to/file");
    }

    #[test]
    fn test_parse_locator_digits_without_path_are_the_path() {
        // "host:21" has no third segment, so 21 is a file name, not a port
        let locator = parse_locator("host:21").unwrap();
        assert_eq!(locator.port, None);
        assert_eq!(locator.path, "21");
    }

    #[test]
    fn test_parse_locator_invalid() {
        let error = parse_locator("just-a-host").unwrap_err();
        assert!(error
            .to_string()
            .contains("expected [user@]host[:port]:path"));
    }

    #[test]
    fn test_parse_locator_port_out_of_range() {
        let error = parse_locator("host:99999:/x").unwrap_err();
        assert!(format!("{:#}", error).contains("invalid port"));
    }
}
