use serde::Serialize;
use std::path::Path;

/// The one language executed in-process by the script interpreter.
pub const LOCAL_TAG: &str = "javascript";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageDescriptor {
    pub tag: &'static str,
    pub remote_id: u32,
    pub display_name: &'static str,
}

static REGISTRY: &[LanguageDescriptor] = &[
    LanguageDescriptor {
        tag: "javascript",
        remote_id: 63,
        display_name: "JavaScript (Node.js 12.14.0)",
    },
    LanguageDescriptor {
        tag: "python",
        remote_id: 71,
        display_name: "Python (3.8.1)",
    },
    LanguageDescriptor {
        tag: "cpp",
        remote_id: 54,
        display_name: "C++ (GCC 9.2.0)",
    },
    LanguageDescriptor {
        tag: "c",
        remote_id: 50,
        display_name: "C (GCC 9.2.0)",
    },
    LanguageDescriptor {
        tag: "java",
        remote_id: 62,
        display_name: "Java (OpenJDK 13.0.1)",
    },
    LanguageDescriptor {
        tag: "go",
        remote_id: 60,
        display_name: "Go (1.13.5)",
    },
    LanguageDescriptor {
        tag: "rust",
        remote_id: 73,
        display_name: "Rust (1.40.0)",
    },
    LanguageDescriptor {
        tag: "php",
        remote_id: 68,
        display_name: "PHP (7.4.1)",
    },
    LanguageDescriptor {
        tag: "ruby",
        remote_id: 72,
        display_name: "Ruby (2.7.0)",
    },
    LanguageDescriptor {
        tag: "csharp",
        remote_id: 51,
        display_name: "C# (Mono 6.6.0.161)",
    },
];

pub fn all() -> &'static [LanguageDescriptor] {
    REGISTRY
}

/// Lowercases the tag and folds common aliases onto registry tags.
/// Unknown tags are returned lowercased and otherwise untouched.
pub fn normalize_tag(tag: &str) -> String {
    let lower = tag.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "js" | "node" | "nodejs" => "javascript",
        "py" | "python3" => "python",
        "c++" | "cxx" => "cpp",
        "c#" | "cs" => "csharp",
        "golang" => "go",
        "rs" => "rust",
        "rb" => "ruby",
        _ => return lower,
    };
    canonical.to_string()
}

pub fn lookup(tag: &str) -> Option<&'static LanguageDescriptor> {
    let tag = normalize_tag(tag);
    REGISTRY.iter().find(|descriptor| descriptor.tag == tag)
}

pub fn tag_for_extension(extension: &str) -> Option<&'static str> {
    let tag = match extension.trim_start_matches('.').to_lowercase().as_str() {
        "js" | "mjs" => "javascript",
        "py" => "python",
        "cpp" | "cc" | "cxx" => "cpp",
        "c" => "c",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        "cs" => "csharp",
        _ => return None,
    };
    Some(tag)
}

pub fn tag_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(tag_for_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("Python").map(|d| d.remote_id), Some(71));
        assert_eq!(lookup("C++").map(|d| d.tag), Some("cpp"));
        assert_eq!(lookup("cs").map(|d| d.remote_id), Some(51));
        assert!(lookup("cobol").is_none());
    }

    #[test]
    fn test_registry_is_complete() {
        let ids: Vec<u32> = all().iter().map(|d| d.remote_id).collect();
        assert_eq!(ids, vec![63, 71, 54, 50, 62, 60, 73, 68, 72, 51]);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(tag_for_path(Path::new("demo/hello.rs")), Some("rust"));
        assert_eq!(tag_for_path(Path::new("main.CC")), Some("cpp"));
        assert_eq!(tag_for_path(Path::new("README")), None);
    }
}
