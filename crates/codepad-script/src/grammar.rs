use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "script.pest"]
pub struct ScriptParser;

#[cfg(test)]
mod tests {
    use super::*;
    use pest::Parser;

    #[test]
    fn test_basic_parsing() {
        let input = r#"
            function addNumbers(a, b) {
                return a + b;
            }
            const sum = addNumbers(15, 25);
            console.log(`Adding 15 + 25 = ${sum}`);
        "#;

        let result = ScriptParser::parse(Rule::program, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        assert!(ScriptParser::parse(Rule::ident, "return").is_err());
        assert!(ScriptParser::parse(Rule::ident, "returnValue").is_ok());
        assert!(ScriptParser::parse(Rule::program, "let letter = 1; letter = 2;").is_ok());
    }

    #[test]
    fn test_comments_are_skipped() {
        let input = "// leading\nconst a = 1; /* block */ const b = a // trailing\n + 2;";
        assert!(ScriptParser::parse(Rule::program, input).is_ok());
    }
}
