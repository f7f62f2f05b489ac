#[cfg(test)]
mod parser_tests {
    use fen::ast::Stmt;
    use fen::ast_printer::AstPrinter;
    use fen::diagnostics::Reporter;
    use fen::parser::Parser;
    use fen::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Reporter) {
        let mut reporter = Reporter::new();
        let tokens = Scanner::new(source).scan_tokens(&mut reporter);
        let statements = Parser::new(&tokens, &mut reporter).parse();
        (statements, reporter)
    }

    /// Parse a single statement and render it with the printer.
    fn printed(source: &str) -> String {
        let (statements, reporter) = parse(source);

        assert!(!reporter.had_error, "unexpected parse error in {:?}", source);
        assert_eq!(statements.len(), 1, "expected one statement in {:?}", source);

        AstPrinter::print_stmt(&statements[0])
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(printed("1 + 2 * 3;"), "(expr (+ 1.0 (* 2.0 3.0)))");
        assert_eq!(printed("(1 + 2) * 3;"), "(expr (* (group (+ 1.0 2.0)) 3.0))");
        assert_eq!(printed("-1 - 2;"), "(expr (- (- 1.0) 2.0))");
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        assert_eq!(
            printed("1 < 2 == true;"),
            "(expr (== (< 1.0 2.0) true))"
        );
    }

    #[test]
    fn ternary_sits_between_equality_and_and() {
        // `and` operands are whole ternaries...
        assert_eq!(
            printed("a and b ? 1 : 2;"),
            "(expr (and a (?: b 1.0 2.0)))"
        );
        // ...and a ternary condition is a bare equality.
        assert_eq!(
            printed("1 == 2 ? \"eq\" : \"ne\";"),
            "(expr (?: (== 1.0 2.0) eq ne))"
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        assert_eq!(
            printed("a ? 1 : b ? 2 : 3;"),
            "(expr (?: a 1.0 (?: b 2.0 3.0)))"
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(printed("a = b = 1;"), "(expr (= a (= b 1.0)))");
    }

    #[test]
    fn property_chains() {
        assert_eq!(
            printed("obj.inner.field = 1;"),
            "(expr (set (get obj inner) field 1.0))"
        );
        assert_eq!(printed("obj.method(1);"), "(expr (call (get obj method) 1.0))");
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_not_fatal() {
        let (statements, reporter) = parse("1 = 2; print 3;");

        assert!(reporter.had_error);
        // Both statements survive: the bad assignment degrades to its LHS.
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn binary_operator_without_left_operand() {
        let (_, reporter) = parse("* 3;");
        assert!(reporter.had_error);
    }

    #[test]
    fn synchronization_recovers_at_statement_boundary() {
        let (statements, reporter) = parse("var = 1;\nprint 2;\nvar ok = 3;");

        assert!(reporter.had_error);
        // The bad declaration is dropped; the two statements after the `;`
        // boundary parse normally.
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn class_body_classifies_members() {
        let (statements, reporter) = parse(
            "class Shape {\n\
               class make() { return Shape(); }\n\
               area { return 0; }\n\
               scale(f) { return f; }\n\
             }",
        );

        assert!(!reporter.had_error);
        assert_eq!(statements.len(), 1);

        match &statements[0] {
            Stmt::Class {
                name,
                superclass,
                methods,
                getters,
                statics,
            } => {
                assert_eq!(name.lexeme, "Shape");
                assert!(superclass.is_none());

                assert_eq!(methods.len(), 1);
                assert_eq!(methods[0].name.lexeme, "scale");
                assert_eq!(methods[0].params.len(), 1);

                assert_eq!(getters.len(), 1);
                assert_eq!(getters[0].name.lexeme, "area");
                assert!(getters[0].params.is_empty());

                assert_eq!(statics.len(), 1);
                assert_eq!(statics[0].name.lexeme, "make");
            }

            other => panic!("expected class declaration, got {:?}", other),
        }
    }

    #[test]
    fn class_with_superclass() {
        assert_eq!(printed("class B < A {}"), "(class B < A)");
    }

    #[test]
    fn super_access_parses() {
        let (_, reporter) = parse("class B < A { m() { return super.m(); } }");
        assert!(!reporter.had_error);
    }

    #[test]
    fn lambda_vs_function_declaration() {
        // Named `fun` is a declaration...
        let (statements, reporter) = parse("fun twice(x) { return x + x; }");
        assert!(!reporter.had_error);
        assert!(matches!(statements[0], Stmt::Function(_)));

        // ...anonymous `fun` is an expression.
        assert_eq!(printed("var f = fun (a, b) { };"), "(var f (lambda (a b)))");
    }

    #[test]
    fn for_desugars_to_while() {
        let (statements, reporter) = parse("for (var i = 0; i < 3; i = i + 1) print i;");

        assert!(!reporter.had_error);
        assert_eq!(statements.len(), 1);

        // Outer block: initializer + while.
        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected desugared block, got {:?}", statements[0]);
        };
        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Stmt::Var { .. }));
        assert!(matches!(outer[1], Stmt::While { .. }));
    }

    #[test]
    fn for_without_clauses() {
        let (statements, reporter) = parse("for (;;) break;");

        assert!(!reporter.had_error);
        // No initializer: the loop itself is the statement.
        assert!(matches!(statements[0], Stmt::While { .. }));
    }

    #[test]
    fn break_statement_parses() {
        let (statements, reporter) = parse("while (true) break;");

        assert!(!reporter.had_error);
        let Stmt::While { body, .. } = &statements[0] else {
            panic!("expected while");
        };
        assert!(matches!(**body, Stmt::Break { .. }));
    }
}
