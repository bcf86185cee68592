//! End-to-end scenarios exercised through the reader, matching the
//! literal surface-syntax examples from the language's testable
//! properties: parse, evaluate against a fresh node, check the result.

use pretty_assertions::assert_eq;

use poly::error::PolyError;
use poly::expr::Expr;
use poly::node::Node;
use poly::parser::read_expr;

fn eval_str(node: &Node, src: &str) -> poly::error::Result<Expr> {
    let expr = read_expr(src)?;
    node.eval(&expr)
}

#[test]
fn arithmetic_sums_ints() {
    let node = Node::new("test");
    assert_eq!(
        eval_str(&node, "(+ 1 2 3)").unwrap(),
        Expr::Int(6.into())
    );
}

#[test]
fn arithmetic_promotes_to_float() {
    let node = Node::new("test");
    assert_eq!(eval_str(&node, "(+ 1.0 2 3)").unwrap(), Expr::Float(6.0));
}

#[test]
fn let_sees_prior_bindings_in_later_right_hand_sides() {
    let node = Node::new("test");
    let result = eval_str(&node, "(let ((x 10) (y (+ x 5))) y)").unwrap();
    assert_eq!(result, Expr::Int(15.into()));
}

#[test]
fn match_picks_first_matching_clause() {
    let node = Node::new("test");
    let result = eval_str(&node, "(match '#yes ((#yes \"ok\") (#no \"bad\")))").unwrap();
    assert_eq!(result, Expr::string("ok"));
}

#[test]
fn match_with_no_matching_clause_yields_nil() {
    let node = Node::new("test");
    let result = eval_str(&node, "(match '#maybe ((#yes \"ok\") (#no \"bad\")))").unwrap();
    assert_eq!(result, Expr::Nil);
}

#[test]
fn recursive_factorial_via_set_star_wrap_and_match() {
    let node = Node::new("test");
    eval_str(
        &node,
        "(set* fact (wrap (op (n) _ (match n ((0 1) (_ (* n (fact (- n 1)))))))))",
    )
    .unwrap();
    let result = eval_str(&node, "(fact 5)").unwrap();
    assert_eq!(result, Expr::Int(120.into()));
}

#[test]
fn ref_cell_mutates_in_place() {
    let node = Node::new("test");
    let result = eval_str(&node, "(let ((r (ref/new 1))) (ref/set! r 2) (ref/get r))").unwrap();
    assert_eq!(result, Expr::Int(2.into()));
}

#[test]
fn module_form_alone_returns_a_native_value_with_resolved_defs() {
    let node = Node::new("test");
    let result = eval_str(
        &node,
        "(module m (f (wrap (op (x) _ (g x)))) (g (wrap (op (x) _ x))))",
    )
    .unwrap();
    assert!(matches!(result, Expr::Native(_)));
}

#[test]
fn load_module_installs_prefixed_bindings_with_forward_resolution() {
    let node = Node::new("test");
    let mut path = std::env::temp_dir();
    path.push("poly_eval_test_module_forward_ref.poly");
    std::fs::write(
        &path,
        "(module m (f (wrap (op (x) _ (g x)))) (g (wrap (op (x) _ x))))",
    )
    .unwrap();

    node.load_module(path.to_str().unwrap(), None).unwrap();
    std::fs::remove_file(&path).ok();

    let result = eval_str(&node, "(m/f 7)").unwrap();
    assert_eq!(result, Expr::Int(7.into()));
}

#[test]
fn improper_list_in_call_position_is_an_error() {
    let node = Node::new("test");
    let err = eval_str(&node, "(+ 1 . 2)").unwrap_err();
    assert!(matches!(err, PolyError::ImproperList(_)));
}

#[test]
fn undefined_variable_lookup_fails() {
    let node = Node::new("test");
    let err = eval_str(&node, "never-bound").unwrap_err();
    assert!(matches!(err, PolyError::Undefined(_)));
}

#[test]
fn blank_cannot_appear_in_evaluation_position() {
    let node = Node::new("test");
    let err = eval_str(&node, "_").unwrap_err();
    assert!(matches!(err, PolyError::CantEval(_)));
}

#[test]
fn map_literal_round_trips_through_show() {
    let node = Node::new("test");
    let result = eval_str(&node, "(show {#a 1 #b 2})").unwrap();
    assert_eq!(result, Expr::string("{#a 1 #b 2}"));
}

#[test]
fn module_load_wraps_inner_failures() {
    let node = Node::new("test");
    let err = node.load_module("/nonexistent/path.poly", None).unwrap_err();
    assert!(matches!(err, PolyError::Module(_)));
}
