#[cfg(test)]
mod integration_tests {
    use crate::{run, Channel, Completion, Limits, Parser, ScriptError};
    use proptest::prelude::*;

    fn exec(source: &str) -> Completion {
        run(source, &Limits::default())
    }

    fn output(source: &str) -> Vec<String> {
        let completion = exec(source);
        assert!(
            completion.fault.is_none(),
            "unexpected fault: {:?}",
            completion.fault
        );
        completion.console.into_iter().map(|line| line.text).collect()
    }

    #[test]
    fn test_sample_program() {
        let source = r#"
            function addNumbers(a, b) {
                return a + b;
            }

            const sum = addNumbers(15, 25);
            console.log(`Adding 15 + 25 = ${sum}`);
        "#;

        assert_eq!(output(source), vec!["Adding 15 + 25 = 40"]);
    }

    #[test]
    fn test_functions_are_hoisted() {
        let source = r#"
            console.log(square(4));
            function square(n) { return n * n; }
        "#;
        assert_eq!(output(source), vec!["16"]);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(
            output("console.log(0.1 + 0.2, 10 / 4, 7 % 3, 2 ** 10, 1 / 0)"),
            vec!["0.30000000000000004 2.5 1 1024 Infinity"]
        );
    }

    #[test]
    fn test_equality_operators() {
        assert_eq!(
            output(r#"console.log(null == undefined, 1 == "1", 1 === "1", [] === [])"#),
            vec!["true true false false"]
        );
    }

    #[test]
    fn test_array_methods() {
        let source = r#"
            const nums = [3, 1, 2];
            console.log(nums.map(n => n * 2).join(","));
            console.log(nums.filter(n => n > 1).length);
            console.log(nums.reduce((acc, n) => acc + n, 0));
            nums.sort((a, b) => a - b);
            console.log(nums);
        "#;

        assert_eq!(output(source), vec!["6,2,4", "2", "6", "[\n  1,\n  2,\n  3\n]"]);
    }

    #[test]
    fn test_objects_print_as_json() {
        let source = r#"
            const person = { name: "Ada", age: 36 };
            person.languages = ["en"];
            console.log(person);
            console.log(Object.keys(person).join(" "));
            console.log(JSON.stringify(person));
        "#;

        assert_eq!(
            output(source),
            vec![
                "{\n  \"name\": \"Ada\",\n  \"age\": 36,\n  \"languages\": [\n    \"en\"\n  ]\n}",
                "name age languages",
                r#"{"name":"Ada","age":36,"languages":["en"]}"#,
            ]
        );
    }

    #[test]
    fn test_json_parse() {
        let source = r#"
            const data = JSON.parse('{"n": 5, "tags": ["a", "b"]}');
            console.log(data.n + 1, data.tags[1]);
        "#;
        assert_eq!(output(source), vec!["6 b"]);
    }

    #[test]
    fn test_string_methods() {
        let source = r#"
            console.log("Hello".toUpperCase(), "a,b,c".split(",").length, "abc".slice(-2));
            console.log("5".padStart(3, "0"), "  hi ".trim(), "banana".indexOf("nan"));
        "#;
        assert_eq!(output(source), vec!["HELLO 3 bc", "005 hi 2"]);
    }

    #[test]
    fn test_console_channels() {
        let completion = exec(r#"console.info("i"); console.warn("w"); console.error("e");"#);
        let channels: Vec<Channel> = completion.console.iter().map(|l| l.channel).collect();
        assert_eq!(channels, vec![Channel::Info, Channel::Warn, Channel::Error]);
    }

    #[test]
    fn test_typeof() {
        assert_eq!(
            output(r#"console.log(typeof missing, typeof 1, typeof "s", typeof null, typeof (() => 1))"#),
            vec!["undefined number string object function"]
        );
    }

    #[test]
    fn test_try_catch_reference_error() {
        let source = r#"
            try {
                notDeclared;
            } catch (e) {
                console.log(e.name + ": " + e.message);
            }
        "#;
        assert_eq!(output(source), vec!["ReferenceError: notDeclared is not defined"]);
    }

    #[test]
    fn test_finally_runs_before_return() {
        let source = r#"
            function f() {
                try {
                    return "try";
                } finally {
                    console.log("finally");
                }
            }
            console.log(f());
        "#;
        assert_eq!(output(source), vec!["finally", "try"]);
    }

    #[test]
    fn test_uncaught_error_reports_message() {
        let completion = exec(r#"console.log("before"); throw new Error("boom");"#);
        assert_eq!(completion.console.len(), 1);
        assert_eq!(completion.fault, Some(ScriptError::Thrown("boom".into())));
    }

    #[test]
    fn test_const_reassignment() {
        let completion = exec("const x = 1; x = 2;");
        assert_eq!(
            completion.fault,
            Some(ScriptError::Thrown("Assignment to constant variable.".into()))
        );
    }

    #[test]
    fn test_let_bindings_per_iteration() {
        let source = r#"
            const fns = [];
            for (let i = 0; i < 3; i++) {
                fns.push(() => i);
            }
            console.log(fns.map(f => f()).join(" "));
        "#;
        assert_eq!(output(source), vec!["0 1 2"]);
    }

    #[test]
    fn test_timers_fire_in_delay_order() {
        let source = r#"
            setTimeout(() => console.log("late"), 100);
            setTimeout(() => console.log("early"), 10);
            const cancelled = setTimeout(() => console.log("never"), 20);
            clearTimeout(cancelled);
            console.log("main");
        "#;
        assert_eq!(output(source), vec!["main", "early", "late"]);
    }

    #[test]
    fn test_timeout_ceiling_cannot_be_caught() {
        let source = r#"
            try {
                setTimeout(() => console.log("x"), 6000);
            } catch (e) {
                console.log("caught");
            }
        "#;
        let completion = exec(source);
        assert!(completion.console.is_empty());
        assert_eq!(
            completion.fault,
            Some(ScriptError::Policy("Timeout too long (max 5 seconds)".into()))
        );
    }

    #[test]
    fn test_step_budget() {
        let limits = Limits {
            max_steps: 10_000,
            ..Limits::default()
        };
        let completion = run("while (true) {}", &limits);
        assert!(matches!(completion.fault, Some(ScriptError::Budget(_))));
    }

    #[test]
    fn test_output_budget() {
        let limits = Limits {
            max_output_bytes: 64,
            ..Limits::default()
        };
        let completion = run(r#"for (let i = 0; i < 100; i++) { console.log("line " + i); }"#, &limits);
        assert!(matches!(completion.fault, Some(ScriptError::Budget(_))));
        assert!(completion.console.len() < 100);
    }

    #[test]
    fn test_runaway_recursion() {
        let completion = exec("function f(n) { return f(n + 1); } f(0);");
        assert_eq!(
            completion.fault,
            Some(ScriptError::Thrown("Maximum call stack size exceeded".into()))
        );
    }

    #[test]
    fn test_syntax_error_has_no_output() {
        let completion = exec("console.log('unterminated);");
        assert!(completion.console.is_empty());
        assert!(matches!(completion.fault, Some(ScriptError::Syntax { .. })));
    }

    #[test]
    fn test_dates() {
        let source = r#"
            const d = new Date(2020, 0, 15);
            console.log(d.getFullYear(), d.getMonth(), d.getDate());
            console.log(typeof Date.now());
        "#;
        assert_eq!(output(source), vec!["2020 0 15", "number"]);
    }

    #[test]
    fn test_error_objects_in_console() {
        assert_eq!(
            output(r#"console.log(new TypeError("bad input"))"#),
            vec!["TypeError: bad input"]
        );
    }

    #[test]
    fn test_nested_parenthesized_assignments_parse_quickly() {
        let depth = 30;
        let source = format!(
            "let a; ({}1{}); console.log(a);",
            "a=(".repeat(depth),
            ")".repeat(depth)
        );

        let started = std::time::Instant::now();
        assert_eq!(output(&source), vec!["1"]);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_arrow_defaults_with_groups() {
        let source = r#"
            const f = (x, y = (1 + (2 * 3)), label = ")") => label + (x + y);
            const g = n => (n = n + 1);
            console.log(f(1), g(1));
        "#;
        assert_eq!(output(source), vec![")8 2"]);
    }

    #[test]
    fn test_circular_array_in_console_throws() {
        let completion = exec("const a = [1]; a.push(a); console.log(a);");
        assert!(completion.console.is_empty());
        assert_eq!(
            completion.fault,
            Some(ScriptError::Thrown("Converting circular structure to JSON".into()))
        );
    }

    #[test]
    fn test_circular_structures_are_catchable() {
        let source = r#"
            const o = { name: "loop" };
            o.self = o;
            try {
                JSON.stringify(o);
            } catch (e) {
                console.log(e.name + ": " + e.message);
            }
            const a = [1];
            a.push(a);
            console.log(a.join(), String(a), `${a}`);
        "#;
        assert_eq!(
            output(source),
            vec![
                "TypeError: Converting circular structure to JSON",
                "1, 1, 1,",
            ]
        );
    }

    #[test]
    fn test_string_doubling_hits_length_limit() {
        let source = r#"
            let s = "x";
            for (let i = 0; i < 40; i++) {
                s = s + s;
            }
        "#;
        assert_eq!(
            exec(source).fault,
            Some(ScriptError::Thrown("Invalid string length".into()))
        );
    }

    #[test]
    fn test_oversized_padding_throws_range_error() {
        let source = r#"
            try {
                "a".padStart(3e8, "x");
            } catch (e) {
                console.log(e.name);
            }
            console.log("a".padEnd(4, "xy"));
        "#;
        assert_eq!(output(source), vec!["RangeError", "axyx"]);
    }

    #[test]
    fn test_comparator_sort_is_budgeted() {
        let limits = Limits {
            max_steps: 200_000,
            ..Limits::default()
        };
        let source = r#"
            const a = [];
            for (let i = 0; i < 3000; i++) {
                a.push(3000 - i);
            }
            a.sort((x, y) => x - y);
        "#;
        let completion = run(source, &limits);
        assert!(matches!(completion.fault, Some(ScriptError::Budget(_))));
    }

    #[test]
    fn test_large_default_sort_completes() {
        let source = r#"
            const a = [];
            for (let i = 0; i < 20000; i++) {
                a.push(20000 - i);
            }
            a.sort();
            console.log(a[0], a[a.length - 1]);
        "#;
        assert_eq!(output(source), vec!["1 9999"]);
    }

    proptest! {
        #[test]
        fn parser_never_panics(source in "[a-z0-9 +*/=;.,'\"-]{0,64}") {
            let _ = Parser::parse_string(&source);
        }

        #[test]
        fn integer_addition_matches(a in -1000i64..1000, b in -1000i64..1000) {
            let completion = run(&format!("console.log({} + {})", a, b), &Limits::default());
            prop_assert!(completion.fault.is_none());
            prop_assert_eq!(completion.console[0].text.clone(), (a + b).to_string());
        }
    }
}
