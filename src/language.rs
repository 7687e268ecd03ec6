use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Language tag for a source file. Names follow the line counter's own
/// naming so both counting strategies key their tables the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Rust,
    C,
    CHeader,
    Cpp,
    CSharp,
    Go,
    Java,
    Kotlin,
    Scala,
    Python,
    Ruby,
    Php,
    Perl,
    JavaScript,
    TypeScript,
    Html,
    Css,
    Scss,
    Shell,
    PowerShell,
    Sql,
    Swift,
    ObjectiveC,
    Lua,
    Haskell,
    Erlang,
    Elixir,
    Clojure,
    Groovy,
    R,
    Dart,
    Markdown,
    Json,
    Yaml,
    Toml,
    Xml,
    Make,
    Dockerfile,
    /// A language the line counter reports that has no extension mapping here.
    Other(String),
    Undefined,
}

fn from_extension(extension: &str) -> Language {
    match extension {
        "rs" => Language::Rust,
        "c" => Language::C,
        "h" => Language::CHeader,
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => Language::Cpp,
        "cs" => Language::CSharp,
        "go" => Language::Go,
        "java" => Language::Java,
        "kt" | "kts" => Language::Kotlin,
        "scala" => Language::Scala,
        "py" | "pyw" => Language::Python,
        "rb" => Language::Ruby,
        "php" => Language::Php,
        "pl" | "pm" => Language::Perl,
        "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
        "ts" | "tsx" => Language::TypeScript,
        "html" | "htm" => Language::Html,
        "css" => Language::Css,
        "scss" => Language::Scss,
        "sh" | "bash" | "zsh" => Language::Shell,
        "ps1" => Language::PowerShell,
        "sql" => Language::Sql,
        "swift" => Language::Swift,
        "m" | "mm" => Language::ObjectiveC,
        "lua" => Language::Lua,
        "hs" => Language::Haskell,
        "erl" => Language::Erlang,
        "ex" | "exs" => Language::Elixir,
        "clj" => Language::Clojure,
        "groovy" | "gradle" => Language::Groovy,
        "r" => Language::R,
        "dart" => Language::Dart,
        "md" | "markdown" => Language::Markdown,
        "json" => Language::Json,
        "yml" | "yaml" => Language::Yaml,
        "toml" => Language::Toml,
        "xml" => Language::Xml,
        "mk" => Language::Make,
        _ => Language::Undefined,
    }
}

impl Language {
    /// Classifies `path` by its lowercased extension. Never fails: anything
    /// unmapped is [`Language::Undefined`].
    pub fn classify(path: &str) -> Language {
        let file_name = Path::new(path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        match file_name {
            "Makefile" | "makefile" | "GNUmakefile" => return Language::Make,
            "Dockerfile" => return Language::Dockerfile,
            _ => {}
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        from_extension(&extension)
    }

    pub fn from_name(name: &str) -> Language {
        match name {
            "Rust" => Language::Rust,
            "C" => Language::C,
            "C/C++ Header" => Language::CHeader,
            "C++" => Language::Cpp,
            "C#" => Language::CSharp,
            "Go" => Language::Go,
            "Java" => Language::Java,
            "Kotlin" => Language::Kotlin,
            "Scala" => Language::Scala,
            "Python" => Language::Python,
            "Ruby" => Language::Ruby,
            "PHP" => Language::Php,
            "Perl" => Language::Perl,
            "JavaScript" => Language::JavaScript,
            "TypeScript" => Language::TypeScript,
            "HTML" => Language::Html,
            "CSS" => Language::Css,
            "SCSS" => Language::Scss,
            "Bourne Shell" => Language::Shell,
            "PowerShell" => Language::PowerShell,
            "SQL" => Language::Sql,
            "Swift" => Language::Swift,
            "Objective-C" => Language::ObjectiveC,
            "Lua" => Language::Lua,
            "Haskell" => Language::Haskell,
            "Erlang" => Language::Erlang,
            "Elixir" => Language::Elixir,
            "Clojure" => Language::Clojure,
            "Groovy" => Language::Groovy,
            "R" => Language::R,
            "Dart" => Language::Dart,
            "Markdown" => Language::Markdown,
            "JSON" => Language::Json,
            "YAML" => Language::Yaml,
            "TOML" => Language::Toml,
            "XML" => Language::Xml,
            "make" => Language::Make,
            "Dockerfile" => Language::Dockerfile,
            "Undefined" => Language::Undefined,
            other => Language::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Language::Rust => "Rust",
            Language::C => "C",
            Language::CHeader => "C/C++ Header",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Go => "Go",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::Scala => "Scala",
            Language::Python => "Python",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Perl => "Perl",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Scss => "SCSS",
            Language::Shell => "Bourne Shell",
            Language::PowerShell => "PowerShell",
            Language::Sql => "SQL",
            Language::Swift => "Swift",
            Language::ObjectiveC => "Objective-C",
            Language::Lua => "Lua",
            Language::Haskell => "Haskell",
            Language::Erlang => "Erlang",
            Language::Elixir => "Elixir",
            Language::Clojure => "Clojure",
            Language::Groovy => "Groovy",
            Language::R => "R",
            Language::Dart => "Dart",
            Language::Markdown => "Markdown",
            Language::Json => "JSON",
            Language::Yaml => "YAML",
            Language::Toml => "TOML",
            Language::Xml => "XML",
            Language::Make => "make",
            Language::Dockerfile => "Dockerfile",
            Language::Undefined => "Undefined",
            Language::Other(name) => name,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Language::from_name(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_lowercase_extension() {
        assert_eq!(Language::classify("src/main.rs"), Language::Rust);
        assert_eq!(Language::classify("web/App.TSX"), Language::TypeScript);
        assert_eq!(Language::classify("include/util.h"), Language::CHeader);
        assert_eq!(Language::classify("Makefile"), Language::Make);
    }

    #[test]
    fn unmapped_paths_are_undefined() {
        assert_eq!(Language::classify("LICENSE"), Language::Undefined);
        assert_eq!(Language::classify("data.bin"), Language::Undefined);
        assert_eq!(Language::classify(".gitignore"), Language::Undefined);
    }

    #[test]
    fn names_round_trip_through_counter_naming() {
        assert_eq!(Language::from_name("C++"), Language::Cpp);
        assert_eq!(Language::Cpp.name(), "C++");
        assert_eq!(
            Language::from_name("Brainfuck"),
            Language::Other("Brainfuck".to_string())
        );
        assert_eq!(Language::from_name("Brainfuck").name(), "Brainfuck");
        assert_eq!(serde_json::to_string(&Language::Undefined).unwrap(), "\"Undefined\"");
    }
}
