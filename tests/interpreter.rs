#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use fen::diagnostics::Reporter;
    use fen::interpreter::Interpreter;
    use fen::parser::Parser;
    use fen::resolver::Resolver;
    use fen::scanner::Scanner;

    /// Drive the full pipeline over `source`, capturing `print` output.
    fn run(source: &str) -> (String, Reporter) {
        let mut reporter = Reporter::new();
        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        let statements = Parser::new(&tokens, &mut reporter).parse();

        assert!(!reporter.had_error, "test source failed to parse: {:?}", source);

        let sink: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_output(sink.clone());

        Resolver::new(&mut interpreter, &mut reporter).resolve(&statements);
        assert!(!reporter.had_error, "test source failed to resolve: {:?}", source);

        interpreter.interpret(&statements, &mut reporter);

        let output = String::from_utf8(sink.borrow().clone()).expect("print output is UTF-8");
        (output, reporter)
    }

    fn assert_prints(source: &str, expected: &[&str]) {
        let (output, reporter) = run(source);

        assert!(
            !reporter.had_runtime_error,
            "unexpected runtime error for {:?}: {:?}",
            source, reporter.last_runtime_error
        );

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines, expected, "output mismatch for {:?}", source);
    }

    /// Assert the program dies with a runtime error whose message contains
    /// `fragment`, and return whatever it printed before dying.
    fn assert_runtime_error(source: &str, fragment: &str) -> String {
        let (output, reporter) = run(source);

        assert!(
            reporter.had_runtime_error,
            "expected runtime error for {:?}",
            source
        );

        let message = reporter.last_runtime_error.unwrap_or_default();
        assert!(
            message.contains(fragment),
            "error {:?} does not mention {:?}",
            message,
            fragment
        );

        output
    }

    // ───────────────────────── printing and operators ────────────────────────

    #[test]
    fn numbers_print_without_trailing_zero() {
        assert_prints("print 6.0;", &["6"]);
        assert_prints("print 3.14;", &["3.14"]);
        assert_prints("print 6.5 + 0.5;", &["7"]);
        assert_prints("print -0.5;", &["-0.5"]);
    }

    #[test]
    fn arithmetic_precedence() {
        assert_prints("print 1 + 2 * 3;", &["7"]);
        assert_prints("print (1 + 2) * 3;", &["9"]);
        assert_prints("print 10 - 4 / 2;", &["8"]);
    }

    #[test]
    fn string_concatenation() {
        assert_prints("print \"foo\" + \"bar\";", &["foobar"]);
        // A string paired with a number stringifies the number, either side.
        assert_prints("print \"n=\" + 6.0;", &["n=6"]);
        assert_prints("print 1 + \" of them\";", &["1 of them"]);
    }

    #[test]
    fn plus_rejects_mixed_non_string_operands() {
        assert_runtime_error("print true + 1;", "Operands must be two numbers or two strings");
    }

    #[test]
    fn comparison_and_equality() {
        assert_prints("print 1 < 2;", &["true"]);
        assert_prints("print 2 <= 2;", &["true"]);
        assert_prints("print 1 == 1;", &["true"]);
        assert_prints("print \"a\" == \"a\";", &["true"]);
        assert_prints("print \"a\" == 1;", &["false"]);
        assert_prints("print nil == nil;", &["true"]);
        assert_prints("print 1 != 2;", &["true"]);
    }

    #[test]
    fn truthiness() {
        assert_prints("print !nil;", &["true"]);
        assert_prints("print !false;", &["true"]);
        // 0 and "" are truthy.
        assert_prints("print !0;", &["false"]);
        assert_prints("print !\"\";", &["false"]);
    }

    #[test]
    fn logical_operators_short_circuit_and_return_operands() {
        assert_prints("print nil or \"yes\";", &["yes"]);
        assert_prints("print 0 or 2;", &["0"]);
        assert_prints("print nil and 1;", &["nil"]);
        assert_prints("print 1 and 2;", &["2"]);
        // The right side of a decided `or` is never evaluated.
        assert_prints("print true or missing;", &["true"]);
    }

    #[test]
    fn ternary_evaluates_only_the_taken_branch() {
        assert_prints("print true ? \"yes\" : \"no\";", &["yes"]);
        assert_prints("print false ? \"yes\" : \"no\";", &["no"]);
        // `missing` is unresolved; laziness keeps it from ever being read.
        assert_prints("var x = true ? 1 : missing; print x;", &["1"]);
        assert_prints("print false ? 1 : true ? 2 : 3;", &["2"]);
    }

    #[test]
    fn unary_minus_requires_a_number() {
        assert_prints("print -(3);", &["-3"]);
        assert_runtime_error("print -\"oops\";", "Operand must be a number");
    }

    // ───────────────────────── variables and scoping ─────────────────────────

    #[test]
    fn shadowing() {
        assert_prints(
            "var a = 1; { var a = 2; print a; } print a;",
            &["2", "1"],
        );
    }

    #[test]
    fn assignment_is_an_expression() {
        assert_prints("var a = 1; print a = 2; print a;", &["2", "2"]);
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        assert_runtime_error("print ghost;", "Undefined variable 'ghost'");
        assert_runtime_error("ghost = 1;", "Undefined variable 'ghost'");
    }

    #[test]
    fn binding_distance_ignores_later_inner_declarations() {
        // The closure resolved `a` to the global before the block declared
        // its own `a`; both calls must keep seeing the global.
        assert_prints(
            "var a = \"global\";\n\
             {\n\
               fun showA() { print a; }\n\
               showA();\n\
               var a = \"block\";\n\
               showA();\n\
               print a;\n\
             }",
            &["global", "global", "block"],
        );
    }

    #[test]
    fn mutation_at_distance_is_observed() {
        assert_prints(
            "fun make() {\n\
               var state = \"first\";\n\
               fun get() { return state; }\n\
               fun set(v) { state = v; }\n\
               print get();\n\
               set(\"second\");\n\
               print get();\n\
             }\n\
             make();",
            &["first", "second"],
        );
    }

    #[test]
    fn closures_capture_by_reference() {
        assert_prints(
            "fun makeCounter() {\n\
               var count = 0;\n\
               fun increment() {\n\
                 count = count + 1;\n\
                 return count;\n\
               }\n\
               return increment;\n\
             }\n\
             var counter = makeCounter();\n\
             print counter();\n\
             print counter();\n\
             print counter();",
            &["1", "2", "3"],
        );
    }

    // ───────────────────────── control flow ─────────────────────────

    #[test]
    fn if_else() {
        assert_prints("if (1 < 2) print \"then\"; else print \"else\";", &["then"]);
        assert_prints("if (nil) print \"then\"; else print \"else\";", &["else"]);
    }

    #[test]
    fn while_loop() {
        assert_prints(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            &["0", "1", "2"],
        );
    }

    #[test]
    fn for_loop_desugars_correctly() {
        assert_prints(
            "for (var i = 0; i < 3; i = i + 1) print i;",
            &["0", "1", "2"],
        );
    }

    #[test]
    fn break_exits_the_nearest_loop() {
        assert_prints(
            "var i = 0;\n\
             while (true) {\n\
               i = i + 1;\n\
               if (i == 3) break;\n\
             }\n\
             print i;",
            &["3"],
        );

        // Only the inner loop stops.
        assert_prints(
            "for (var i = 0; i < 2; i = i + 1) {\n\
               for (var j = 0; j < 10; j = j + 1) {\n\
                 if (j == 1) break;\n\
                 print i + j;\n\
               }\n\
             }",
            &["0", "1"],
        );
    }

    #[test]
    fn break_skips_the_for_increment() {
        assert_prints(
            "for (var j = 0; j < 10; j = j + 1) {\n\
               if (j == 2) break;\n\
               print j;\n\
             }",
            &["0", "1"],
        );
    }

    #[test]
    fn return_passes_through_loops() {
        assert_prints(
            "fun firstOver(limit) {\n\
               var n = 0;\n\
               while (true) {\n\
                 if (n > limit) return n;\n\
                 n = n + 1;\n\
               }\n\
             }\n\
             print firstOver(4);",
            &["5"],
        );
    }

    // ───────────────────────── functions and lambdas ─────────────────────────

    #[test]
    fn recursion() {
        assert_prints(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
             print fib(10);",
            &["55"],
        );
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_prints("fun noop() {} print noop();", &["nil"]);
    }

    #[test]
    fn arity_mismatch_names_expected_and_actual() {
        let output = assert_runtime_error(
            "fun add(a, b) { print \"ran\"; return a + b; }\n\
             add(1);",
            "Expected 2 arguments but got 1",
        );
        // The body must not have started.
        assert_eq!(output, "");

        assert_runtime_error(
            "fun add(a, b) { return a + b; }\nadd(1, 2, 3);",
            "Expected 2 arguments but got 3",
        );
    }

    #[test]
    fn calling_a_non_callable() {
        assert_runtime_error("\"nope\"();", "Can only call functions and classes");
        assert_runtime_error("nil();", "Can only call functions and classes");
    }

    #[test]
    fn lambdas_are_first_class() {
        assert_prints(
            "var twice = fun (f, x) { return f(f(x)); };\n\
             print twice(fun (n) { return n + 1; }, 5);",
            &["7"],
        );
    }

    #[test]
    fn lambdas_close_over_their_environment() {
        assert_prints(
            "var makeAdder = fun (n) { return fun (x) { return x + n; }; };\n\
             var add3 = makeAdder(3);\n\
             print add3(4);",
            &["7"],
        );
    }

    #[test]
    fn clock_native_is_seeded() {
        assert_prints("print clock() > 0;", &["true"]);
    }

    // ───────────────────────── classes ─────────────────────────

    #[test]
    fn instances_hold_fields_and_methods_bind_this() {
        assert_prints(
            "class Counter {\n\
               init(start) { this.value = start; }\n\
               bump() { this.value = this.value + 1; return this.value; }\n\
             }\n\
             var c = Counter(2);\n\
             print c.bump();\n\
             print c.value;\n\
             print c;\n\
             print Counter;",
            &["3", "3", "Counter instance", "Counter"],
        );
    }

    #[test]
    fn initializer_always_yields_the_instance() {
        assert_prints(
            "class Box {\n\
               init(v) {\n\
                 this.v = v;\n\
                 if (v == 0) return;\n\
                 this.doubled = v + v;\n\
               }\n\
             }\n\
             var b = Box(0);\n\
             print b.v;\n\
             print Box(5).doubled;\n\
             print b.init(9).v;",
            &["0", "10", "9"],
        );
    }

    #[test]
    fn undefined_property_is_a_runtime_error() {
        assert_runtime_error(
            "class Empty {} print Empty().missing;",
            "Undefined property 'missing'",
        );
    }

    #[test]
    fn properties_only_exist_on_instances_and_classes() {
        assert_runtime_error("var x = 1; print x.y;", "Only instances have properties");
        assert_runtime_error("var x = 1; x.y = 2;", "Only instances have fields");
    }

    #[test]
    fn methods_reference_their_class_recursively() {
        assert_prints(
            "class Chain { make() { return Chain(); } }\n\
             print Chain().make();",
            &["Chain instance"],
        );
    }

    #[test]
    fn instance_identity_equality() {
        assert_prints(
            "class P {}\n\
             var p1 = P();\n\
             var p2 = P();\n\
             print p1 == p2;\n\
             print p1 == p1;",
            &["false", "true"],
        );
    }

    // ───────────────────────── inheritance ─────────────────────────

    #[test]
    fn inherited_methods_run_with_the_subclass_instance() {
        assert_prints(
            "class A {\n\
               greet() { return \"A:\" + this.name; }\n\
             }\n\
             class B < A {\n\
               init(name) { this.name = name; }\n\
             }\n\
             print B(\"bee\").greet();",
            &["A:bee"],
        );
    }

    #[test]
    fn overriding_and_super() {
        assert_prints(
            "class Base {\n\
               describe() { return \"base\"; }\n\
             }\n\
             class Derived < Base {\n\
               describe() { return \"derived+\" + super.describe(); }\n\
             }\n\
             print Derived().describe();",
            &["derived+base"],
        );
    }

    #[test]
    fn super_binds_the_current_instance() {
        assert_prints(
            "class X {\n\
               who() { return this.tag; }\n\
             }\n\
             class Y < X {\n\
               init() { this.tag = \"y\"; }\n\
               who() { return \"via \" + super.who(); }\n\
             }\n\
             print Y().who();",
            &["via y"],
        );
    }

    #[test]
    fn superclass_must_be_a_class() {
        assert_runtime_error(
            "var NotAClass = 1; class C < NotAClass {}",
            "Superclass must be a class",
        );
    }

    #[test]
    fn super_method_missing() {
        assert_runtime_error(
            "class A {}\n\
             class B < A { m() { return super.m(); } }\n\
             B().m();",
            "Undefined property 'm'",
        );
    }

    // ───────────────────────── getters ─────────────────────────

    #[test]
    fn getters_run_on_property_access() {
        assert_prints(
            "class Circle {\n\
               init(r) { this.r = r; }\n\
               area { return this.r * this.r * 3; }\n\
             }\n\
             var c = Circle(2);\n\
             print c.area;",
            &["12"],
        );
    }

    #[test]
    fn getters_see_current_field_values() {
        assert_prints(
            "class Box {\n\
               init() { this.v = 1; }\n\
               doubled { return this.v + this.v; }\n\
             }\n\
             var b = Box();\n\
             print b.doubled;\n\
             b.v = 10;\n\
             print b.doubled;",
            &["2", "20"],
        );
    }

    #[test]
    fn getters_are_inherited() {
        assert_prints(
            "class Shape { kind { return \"shape\"; } }\n\
             class Square < Shape {}\n\
             print Square().kind;",
            &["shape"],
        );
    }

    // ───────────────────────── statics ─────────────────────────

    #[test]
    fn static_methods_are_called_on_the_class() {
        assert_prints(
            "class Numbers {\n\
               class square(n) { return n * n; }\n\
             }\n\
             print Numbers.square(4);",
            &["16"],
        );
    }

    #[test]
    fn static_state_is_distinct_from_instance_fields() {
        assert_prints(
            "class Registry {}\n\
             Registry.limit = 10;\n\
             print Registry.limit;\n\
             var r = Registry();\n\
             r.limit = 99;\n\
             print r.limit;\n\
             print Registry.limit;",
            &["10", "99", "10"],
        );
    }

    #[test]
    fn instances_do_not_see_statics() {
        assert_runtime_error(
            "class C { class helper() { return 1; } }\n\
             print C().helper;",
            "Undefined property 'helper'",
        );
    }

    // ───────────────────────── runtime error handling ─────────────────────────

    #[test]
    fn division_by_zero_preserves_prior_output() {
        let output = assert_runtime_error(
            "print 1;\nprint 2;\n1 / 0;\nprint 3;",
            "Division by zero",
        );

        // Everything before the error already ran; nothing after it does.
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn type_errors_in_arithmetic() {
        assert_runtime_error("print 1 - \"x\";", "Operands must be numbers");
        assert_runtime_error("print \"a\" < \"b\";", "Operands must be numbers");
    }
}
