use crate::language::normalize_tag;
use crate::result::ExecutionResult;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

pub const SIMULATED_STATUS: &str = "Simulated";

const EXPRESSION: &str = "[expression]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// `print(...)` style: the whole argument list is captured.
    Call,
    /// `std::cout << a << b;` style: operands separated by `<<`.
    Stream,
}

struct Dialect {
    tag: &'static str,
    icon: &'static str,
    label: &'static str,
    statement: &'static str,
    compiled: bool,
    form: Form,
    pattern: Regex,
}

impl Dialect {
    fn new(
        tag: &'static str,
        icon: &'static str,
        label: &'static str,
        statement: &'static str,
        compiled: bool,
        form: Form,
        pattern: &str,
    ) -> Self {
        Self {
            tag,
            icon,
            label,
            statement,
            compiled,
            form,
            pattern: Regex::new(pattern).expect("valid regex"),
        }
    }

    fn scan(&self, source: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(captures) = self.pattern.captures(line) else {
                continue;
            };
            let argument = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            match self.form {
                Form::Call => lines.push(render_argument(argument)),
                Form::Stream => {
                    if let Some(rendered) = render_stream(argument) {
                        lines.push(rendered);
                    }
                }
            }
        }
        lines
    }

    fn transcript(&self, lines: &[String]) -> String {
        if lines.is_empty() {
            let capability = if self.compiled {
                "full compilation capabilities"
            } else {
                "full execution capabilities"
            };
            return format!(
                "{} {} code simulated (no {} statements found)\n⚠️ Connect to internet for {}",
                self.icon, self.label, self.statement, capability
            );
        }

        let capability = if self.compiled {
            "full compilation and execution"
        } else {
            "full execution"
        };
        format!(
            "{} {} Simulation:\n{}\n\n⚠️ Limited simulation - connect to internet for {}",
            self.icon,
            self.label,
            lines.join("\n"),
            capability
        )
    }
}

static DIALECTS: Lazy<Vec<Dialect>> = Lazy::new(|| {
    vec![
        Dialect::new("python", "🐍", "Python", "print", false, Form::Call, r"\bprint\s*\((.*)\)"),
        Dialect::new(
            "javascript",
            "🟨",
            "JavaScript",
            "console.log",
            false,
            Form::Call,
            r"\bconsole\.(?:log|info|warn|error|debug)\s*\((.*)\)",
        ),
        Dialect::new(
            "ruby",
            "💎",
            "Ruby",
            "puts",
            false,
            Form::Call,
            r"^(?:puts|print)\b\s*\(?\s*(.*?)\s*\)?\s*$",
        ),
        Dialect::new("php", "🐘", "PHP", "echo", false, Form::Call, r"\becho\s+(.*?)\s*;"),
        Dialect::new(
            "cpp",
            "⚡",
            "C++",
            "cout",
            true,
            Form::Stream,
            r"\b(?:std::)?cout\s*<<\s*(.+?)\s*;",
        ),
        Dialect::new("c", "🔧", "C", "printf", true, Form::Call, r"\bprintf\s*\((.*)\)\s*;"),
        Dialect::new(
            "java",
            "☕",
            "Java",
            "System.out.println",
            true,
            Form::Call,
            r"\bSystem\.out\.print(?:ln|f)?\s*\((.*)\)\s*;",
        ),
        Dialect::new(
            "go",
            "🐹",
            "Go",
            "fmt.Println",
            true,
            Form::Call,
            r"\bfmt\.Print(?:ln|f)?\s*\((.*)\)",
        ),
        Dialect::new(
            "rust",
            "🦀",
            "Rust",
            "println!",
            true,
            Form::Call,
            r"\bprint(?:ln)?!\s*\((.*)\)",
        ),
        Dialect::new(
            "csharp",
            "🎯",
            "C#",
            "Console.WriteLine",
            true,
            Form::Call,
            r"\bConsole\.Write(?:Line)?\s*\((.*)\)\s*;",
        ),
    ]
});

static BRACE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("valid regex"));

static PRINTF_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[-+ 0#]*\d*(?:\.\d+)?[a-zA-Z]").expect("valid regex"));

/// Fakes a transcript for code that cannot be executed. Never fails and
/// always reports itself as a simulation.
pub fn simulate(source: &str, language: &str) -> ExecutionResult {
    let tag = normalize_tag(language);
    let output = match DIALECTS.iter().find(|d| d.tag == tag) {
        Some(dialect) => {
            let lines = dialect.scan(source);
            debug!("Simulated {} output lines for {}", lines.len(), dialect.tag);
            dialect.transcript(&lines)
        }
        None => format!(
            "✅ {} simulation (limited functionality)\n⚠️ Connect to internet for full execution capabilities",
            language
        ),
    };

    ExecutionResult::success(output).with_status(SIMULATED_STATUS)
}

/// Splits a leading quoted literal off `text`, returning its unescaped
/// contents and whatever follows the closing quote.
fn leading_literal(text: &str) -> Option<(String, &str)> {
    let mut chars = text.char_indices();
    let (_, quote) = chars.next()?;
    if !matches!(quote, '"' | '\'' | '`') {
        return None;
    }

    let mut literal = String::new();
    let mut escaped = false;
    for (index, c) in chars {
        if escaped {
            match c {
                'n' => literal.push('\n'),
                't' => literal.push('\t'),
                other => literal.push(other),
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some((literal, &text[index + c.len_utf8()..]));
        } else {
            literal.push(c);
        }
    }
    None
}

fn render_argument(argument: &str) -> String {
    let argument = argument.trim();

    if let Some(rest) = argument.strip_prefix('f') {
        if let Some((literal, tail)) = leading_literal(rest) {
            if tail.trim().is_empty() {
                return clean(&BRACE_PLACEHOLDER.replace_all(&literal, EXPRESSION));
            }
        }
    }

    match leading_literal(argument) {
        Some((literal, tail)) => {
            let tail = tail.trim();
            if tail.is_empty() {
                clean(&literal)
            } else if tail.starts_with(',') {
                let filled = BRACE_PLACEHOLDER.replace_all(&literal, EXPRESSION);
                clean(&PRINTF_PLACEHOLDER.replace_all(&filled, EXPRESSION))
            } else {
                format!("{}{}", clean(&literal), EXPRESSION)
            }
        }
        None => argument.to_string(),
    }
}

fn render_stream(chain: &str) -> Option<String> {
    let mut rendered = String::new();
    let mut pieces = 0;
    for operand in chain.split("<<").map(str::trim) {
        if matches!(operand, "std::endl" | "endl" | "") {
            continue;
        }
        pieces += 1;
        match leading_literal(operand) {
            Some((literal, _)) => rendered.push_str(&literal),
            None => rendered.push_str(EXPRESSION),
        }
    }
    (pieces > 0).then(|| clean(&rendered))
}

/// Drops the trailing newline most print-with-format calls end with.
fn clean(text: &str) -> String {
    text.trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_python_prints() {
        let source = "name = 'Ada'\nprint(\"Hello\")\nprint(f\"Hi {name}!\")\nprint(name)\n";
        let result = simulate(source, "python");
        assert!(result.is_success());
        assert_eq!(result.status(), Some("Simulated"));
        assert_eq!(
            result.output(),
            "🐍 Python Simulation:\nHello\nHi [expression]!\nname\n\n⚠️ Limited simulation - connect to internet for full execution"
        );
    }

    #[test]
    fn test_python_without_prints() {
        let result = simulate("x = 1\n", "Python");
        assert_eq!(
            result.output(),
            "🐍 Python code simulated (no print statements found)\n⚠️ Connect to internet for full execution capabilities"
        );
    }

    #[test]
    fn test_cpp_stream_insertion() {
        let source = r#"
            #include <iostream>
            int main() {
                int x = 3;
                std::cout << "Hello, World!" << std::endl;
                std::cout << "x = " << x << "\n";
                return 0;
            }
        "#;
        let result = simulate(source, "c++");
        assert_eq!(
            result.output(),
            "⚡ C++ Simulation:\nHello, World!\nx = [expression]\n\n⚠️ Limited simulation - connect to internet for full compilation and execution"
        );
    }

    #[test]
    fn test_cpp_without_cout() {
        let result = simulate("int main() { return 0; }", "cpp");
        assert_eq!(
            result.output(),
            "⚡ C++ code simulated (no cout statements found)\n⚠️ Connect to internet for full compilation capabilities"
        );
    }

    #[test]
    fn test_format_placeholders() {
        let rust = simulate("fn main() {\n    println!(\"sum = {}\", 1 + 2);\n}", "rust");
        assert!(rust.output().contains("\nsum = [expression]\n"));

        let c = simulate("printf(\"%d items\\n\", n);", "c");
        assert!(c.output().contains("\n[expression] items\n"));

        let java = simulate("System.out.println(\"Total: \" + total);", "java");
        assert!(java.output().contains("\nTotal: [expression]\n"));
    }

    #[test]
    fn test_unknown_language() {
        let result = simulate("whatever", "cobol");
        assert!(result.is_success());
        assert_eq!(
            result.output(),
            "✅ cobol simulation (limited functionality)\n⚠️ Connect to internet for full execution capabilities"
        );
    }

    proptest! {
        #[test]
        fn simulation_never_fails(source in ".{0,200}", language in "[a-z+#]{0,12}") {
            let result = simulate(&source, &language);
            prop_assert!(result.is_success());
            prop_assert_eq!(result.status(), Some(SIMULATED_STATUS));
        }
    }
}
