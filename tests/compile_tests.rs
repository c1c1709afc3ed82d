use quarry::compile::CompileError;
use quarry::expr::{asc, col, desc, lit, sum};
use quarry::Plan;

fn orders() -> Plan {
    Plan::table("acme-analytics", "sales", "orders")
}

// ============================================================================
// Spec scenario: select -> filter -> group/summarise -> arrange
// ============================================================================

#[test]
fn full_pipeline_compiles_with_where_before_aggregation() {
    let plan = orders()
        .select(["a", "b"])
        .filter(col("a").gt(lit(5)))
        .group_by(["b"])
        .summarise([("total", sum(col("a")))])
        .arrange([desc(col("total"))]);

    let sql = plan.compile().unwrap();
    assert_eq!(
        sql,
        "SELECT b, SUM(a) AS total FROM `acme-analytics.sales.orders` \
         WHERE (a > 5) GROUP BY b ORDER BY total DESC"
    );
    assert!(!sql.contains("HAVING"));
}

#[test]
fn outer_clause_selects_group_keys_and_aggregate_names() {
    let sql = orders()
        .group_by(["region", "year"])
        .summarise([("total", sum(col("amount")))])
        .compile()
        .unwrap();
    assert!(sql.starts_with("SELECT region, year, SUM(amount) AS total"));
}

// ============================================================================
// Structural immutability
// ============================================================================

#[test]
fn appending_to_one_branch_does_not_change_the_other() {
    let prefix = orders().select(["a", "b"]);
    let before = prefix.filter(col("a").gt(lit(5))).compile().unwrap();

    // Grow a sibling branch from the same prefix.
    let _other = prefix
        .mutate("x", col("b").mul(lit(2)))
        .arrange([asc(col("x"))]);

    let after = prefix.filter(col("a").gt(lit(5))).compile().unwrap();
    assert_eq!(before, after);
}

#[test]
fn compile_twice_is_byte_identical() {
    let plan = orders()
        .mutate("x", col("a").add(lit(1)))
        .filter(col("x").gt(lit(0)))
        .group_by(["b"])
        .summarise([("n", quarry::expr::count(col("x")))])
        .arrange([desc(col("n")), asc(col("b"))]);

    let first = plan.compile().unwrap();
    let second = plan.compile().unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Sort handling
// ============================================================================

#[test]
fn plans_without_sort_emit_no_order_by() {
    let plans = vec![
        orders(),
        orders().select(["a"]),
        orders().filter(col("a").gt(lit(1))),
        orders()
            .group_by(["b"])
            .summarise([("total", sum(col("a")))]),
    ];
    for plan in plans {
        let sql = plan.compile().unwrap();
        assert!(!sql.contains("ORDER BY"), "unexpected ORDER BY in: {}", sql);
    }
}

#[test]
fn sort_keys_from_successive_arranges_accumulate_in_order() {
    let sql = orders()
        .arrange([asc(col("a"))])
        .arrange([desc(col("b"))])
        .compile()
        .unwrap();
    assert!(sql.ends_with("ORDER BY a ASC, b DESC"), "got: {}", sql);
}

#[test]
fn sort_survives_a_later_clause_boundary() {
    let sql = orders()
        .arrange([desc(col("b"))])
        .mutate("x", col("a").add(lit(1)))
        .filter(col("x").gt(lit(0)))
        .compile()
        .unwrap();
    // One ORDER BY, on the outermost clause.
    assert_eq!(sql.matches("ORDER BY").count(), 1);
    assert!(sql.ends_with("ORDER BY b DESC"), "got: {}", sql);
}

#[test]
fn sort_key_dropped_by_later_aggregation_is_unknown() {
    let err = orders()
        .arrange([desc(col("amount"))])
        .group_by(["region"])
        .summarise([("total", sum(col("amount")))])
        .compile()
        .unwrap_err();
    assert_eq!(err, CompileError::UnknownColumn("amount".to_string()));
}

// ============================================================================
// Scope errors are compile-time, never execute-time
// ============================================================================

#[test]
fn column_removed_by_project_is_unknown_downstream() {
    let err = orders()
        .select(["a"])
        .filter(col("b").gt(lit(0)))
        .compile()
        .unwrap_err();
    assert_eq!(err, CompileError::UnknownColumn("b".to_string()));
}

#[test]
fn column_removed_by_aggregation_is_unknown_downstream() {
    let err = orders()
        .group_by(["region"])
        .summarise([("total", sum(col("amount")))])
        .select(["amount"])
        .compile()
        .unwrap_err();
    assert_eq!(err, CompileError::UnknownColumn("amount".to_string()));
}

#[test]
fn builder_calls_never_fail_eagerly() {
    // The bad reference only surfaces at compile().
    let plan = orders().select(["a"]).mutate("x", col("nope").add(lit(1)));
    assert_eq!(plan.ops().len(), 2);
    assert!(plan.compile().is_err());
}

// ============================================================================
// Derived-column shadowing
// ============================================================================

#[test]
fn shadowed_column_resolves_to_newest_definition() {
    let sql = orders()
        .select(["a", "b"])
        .mutate("a", col("a").mul(lit(2)))
        .mutate("c", col("a").add(lit(1)))
        .compile()
        .unwrap();
    // `c` is built from the shadowing definition of `a`, inlined.
    assert_eq!(
        sql,
        "SELECT (a * 2) AS a, b, ((a * 2) + 1) AS c \
         FROM `acme-analytics.sales.orders`"
    );
}

#[test]
fn aggregate_over_derived_column_inlines_the_definition() {
    let sql = orders()
        .mutate("margin", col("revenue").sub(col("cost")))
        .group_by(["region"])
        .summarise([("total_margin", sum(col("margin")))])
        .compile()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT region, SUM((revenue - cost)) AS total_margin \
         FROM `acme-analytics.sales.orders` GROUP BY region"
    );
}
