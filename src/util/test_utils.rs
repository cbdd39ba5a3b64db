use crate::{optimizer, parser, type_checker, util::fmt::ir};

/// File name reported in the locations of test programs.
pub const TEST_FILE: &str = "test.gof";

/// Each variant contains the input and names the last stage to run.
pub enum Test {
    Parser(&'static str),
    Checker(&'static str),
    Optimizer(&'static str),
}

pub enum Assertion {
    IrOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the pipeline up to the requested stage, returning the IR dump of the
/// last successful stage and the errors formatted as `line:col: message`.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let input = match test {
        Test::Parser(input) | Test::Checker(input) | Test::Optimizer(input) => input,
    };

    let program = match parser::parse_program(input, TEST_FILE) {
        Ok(program) => program,
        Err(error) => return (String::new(), vec![format!("{error:#}")]),
    };
    if let Test::Parser(_) = test {
        return (ir::print_program_string(&program), vec![]);
    }

    if let Err(error) = type_checker::check(&program) {
        return (ir::print_program_string(&program), vec![format!("{error:#}")]);
    }
    if let Test::Checker(_) = test {
        return (ir::print_program_string(&program), vec![]);
    }

    let program = optimizer::optimize(program);
    (ir::print_program_string(&program), vec![])
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, formatted_actual_ir: &str, formatted_actual_errors: &[String]) {
    match assertion {
        Assertion::IrOk(expected_ir) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_ir.trim(), expected_ir.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! pipeline_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let source = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    pipeline_tests!(@@get_test($test_kind), $source);
                let (formatted_actual_ir, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_ir, &formatted_actual_errors);
                pipeline_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            pipeline_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        pipeline_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, ir_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::IrOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser), $source:expr) => {
        crate::util::test_utils::Test::Parser($source)
    };
    (@@get_test(checker), $source:expr) => {
        crate::util::test_utils::Test::Checker($source)
    };
    (@@get_test(optimizer), $source:expr) => {
        crate::util::test_utils::Test::Optimizer($source)
    };
}
pub(crate) use pipeline_tests;
