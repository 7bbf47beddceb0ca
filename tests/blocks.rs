use indoc::indoc;
use kdl_decode::{
    Block, DiagnosticKind, Schema,
    ast::{AttributeStmt, BlockStmt, Body, Expr, Stmt},
    static_schema,
};

#[derive(Debug, Default, PartialEq)]
struct Relabel {
    name: String,
    rules: Vec<Rule>,
    endpoints: [Endpoint; 2],
    forward: Option<Endpoint>,
    cache: Cache,
}

impl Block for Relabel {
    fn schema() -> &'static Schema<Self> {
        static_schema!(Relabel, |schema| schema
            .attr("name", |r| &mut r.name)
            .optional()
            .blocks("rule", |r| &mut r.rules)
            .optional()
            .block_array("endpoint", |r| &mut r.endpoints)
            .optional()
            .option_block("forward.to", |r| &mut r.forward)
            .optional()
            .block("cache", |r| &mut r.cache)
            .optional())
    }
}

#[derive(Debug, Default, PartialEq)]
struct Rule {
    action: String,
    source_labels: Vec<String>,
}

impl Block for Rule {
    fn schema() -> &'static Schema<Self> {
        static_schema!(Rule, |schema| schema
            .attr("action", |r| &mut r.action)
            .attr("source_labels", |r| &mut r.source_labels)
            .optional())
    }
}

#[derive(Debug, Default, PartialEq)]
struct Endpoint {
    url: String,
    name: String,
}

impl Block for Endpoint {
    fn schema() -> &'static Schema<Self> {
        static_schema!(Endpoint, |schema| schema
            .attr("url", |e| &mut e.url)
            .attr("name", |e| &mut e.name)
            .optional())
    }
}

#[derive(Debug, Default, PartialEq)]
struct Cache {
    size: u32,
}

impl Block for Cache {
    fn schema() -> &'static Schema<Self> {
        static_schema!(Cache, |schema| schema.attr("size", |c| &mut c.size))
    }
}

fn rule(action: &str) -> Stmt {
    BlockStmt::new(
        "rule",
        vec![AttributeStmt::new("action", Expr::literal(action)).into()],
    )
    .into()
}

fn actions(relabel: &Relabel) -> Vec<&str> {
    relabel.rules.iter().map(|r| r.action.as_str()).collect()
}

#[test]
fn repeated_blocks_fill_a_vec_in_order() {
    let kdl = indoc! {r#"
        name "relabel"
        rule {
            action "keep"
            source_labels "__name__" "job"
        }
        rule {
            action "drop"
        }
    "#};

    let relabel: Relabel = kdl_decode::from_str(kdl).unwrap();
    assert_eq!(
        relabel.rules,
        [
            Rule {
                action: "keep".into(),
                source_labels: vec!["__name__".into(), "job".into()],
            },
            Rule {
                action: "drop".into(),
                source_labels: vec![],
            },
        ]
    );
}

#[test]
fn growable_length_matches_block_count() {
    for n in [0, 1, 3] {
        let stmts = (0..n).map(|i| rule(&format!("action-{i}"))).collect();
        let mut relabel = Relabel::default();
        kdl_decode::decode(&Body::new(stmts), &mut relabel).unwrap();

        assert_eq!(relabel.rules.len(), n);
        for (i, rule) in relabel.rules.iter().enumerate() {
            assert_eq!(rule.action, format!("action-{i}"));
        }
    }
}

#[test]
fn interleaved_blocks_keep_per_name_order() {
    let kdl = indoc! {r#"
        rule { action "a"; }
        cache { size 10; }
        rule { action "b"; }
        name "x"
        rule { action "c"; }
    "#};

    let relabel: Relabel = kdl_decode::from_str(kdl).unwrap();
    assert_eq!(actions(&relabel), ["a", "b", "c"]);
    assert_eq!(relabel.cache.size, 10);
}

#[test]
fn growable_discards_prior_contents() {
    let mut relabel = Relabel {
        rules: vec![
            Rule {
                action: "old-1".into(),
                source_labels: vec!["stale".into()],
            },
            Rule {
                action: "old-2".into(),
                source_labels: vec![],
            },
        ],
        ..Default::default()
    };

    let body = Body::new(vec![rule("new")]);
    kdl_decode::decode(&body, &mut relabel).unwrap();

    assert_eq!(
        relabel.rules,
        [Rule {
            action: "new".into(),
            source_labels: vec![],
        }]
    );
}

#[test]
fn growable_without_blocks_is_left_alone() {
    let mut relabel = Relabel {
        rules: vec![Rule::default()],
        ..Default::default()
    };

    let body = Body::new(vec![AttributeStmt::new("name", Expr::literal("x")).into()]);
    kdl_decode::decode(&body, &mut relabel).unwrap();
    assert_eq!(relabel.rules.len(), 1);
}

#[test]
fn fixed_size_accepts_exact_count() {
    let kdl = indoc! {r#"
        endpoint url="http://a"
        endpoint url="http://b" name="second"
    "#};

    let relabel: Relabel = kdl_decode::from_str(kdl).unwrap();
    assert_eq!(relabel.endpoints[0].url, "http://a");
    assert_eq!(relabel.endpoints[1].url, "http://b");
    assert_eq!(relabel.endpoints[1].name, "second");
}

#[test]
fn fixed_size_count_mismatch() {
    let err = kdl_decode::from_str::<Relabel>(r#"endpoint url="http://a""#).unwrap_err();
    let diagnostics = err.diagnostics().unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].kind,
        DiagnosticKind::ArityMismatch {
            expected: 2,
            actual: 1,
        }
    );
    assert_eq!(
        diagnostics[0].message,
        r#"block "endpoint" must be specified exactly 2 times, but was specified 1 times"#
    );
}

#[test]
fn fixed_size_too_many_is_reported_at_first_block() {
    let kdl = indoc! {r#"
        name "x"
        endpoint url="http://a"
        endpoint url="http://b"
        endpoint url="http://c"
    "#};

    let err = kdl_decode::from_str::<Relabel>(kdl).unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(
        diagnostics[0].message,
        r#"block "endpoint" must be specified exactly 2 times, but was specified 3 times"#
    );
    assert_eq!(diagnostics[0].start_pos.line, 2);
}

#[test]
fn singular_block_decodes_once() {
    let relabel: Relabel = kdl_decode::from_str("cache { size 128; }").unwrap();
    assert_eq!(relabel.cache, Cache { size: 128 });
}

#[test]
fn singular_block_given_twice() {
    let kdl = indoc! {r#"
        cache { size 1; }
        cache { size 2; }
    "#};

    let err = kdl_decode::from_str::<Relabel>(kdl).unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(diagnostics[0].kind, DiagnosticKind::DuplicateBlock);
    assert_eq!(
        diagnostics[0].message,
        r#"block "cache" may only be specified once"#
    );
}

#[test]
fn option_block_is_allocated_on_use() {
    let relabel: Relabel = kdl_decode::from_str(r#"name "x""#).unwrap();
    assert_eq!(relabel.forward, None);

    let relabel: Relabel = kdl_decode::from_str(r#"forward.to url="http://remote""#).unwrap();
    assert_eq!(
        relabel.forward,
        Some(Endpoint {
            url: "http://remote".into(),
            name: String::new(),
        })
    );
}

#[test]
fn dotted_names_match_the_full_path() {
    let body = Body::new(vec![
        BlockStmt::new(
            "forward.to",
            vec![AttributeStmt::new("url", Expr::literal("http://remote")).into()],
        )
        .into(),
    ]);
    let mut relabel = Relabel::default();
    kdl_decode::decode(&body, &mut relabel).unwrap();
    assert_eq!(relabel.forward.unwrap().url, "http://remote");

    let err = kdl_decode::from_str::<Relabel>("forward { }").unwrap_err();
    assert_eq!(
        err.diagnostics().unwrap()[0].message,
        r#"unrecognized block name "forward""#
    );
}

#[test]
fn unrecognized_block() {
    let err = kdl_decode::from_str::<Relabel>("tls { }").unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(diagnostics[0].kind, DiagnosticKind::UnrecognizedBlock);
    assert_eq!(diagnostics[0].message, r#"unrecognized block name "tls""#);
}

#[test]
fn block_used_for_attribute_field() {
    let err = kdl_decode::from_str::<Relabel>(r#"name { }"#).unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(diagnostics[0].kind, DiagnosticKind::BlockIsAttribute);
    assert_eq!(
        diagnostics[0].message,
        r#""name" must be an attribute, but is used as a block"#
    );
}

#[test]
fn nested_bodies_track_names_separately() {
    // `name` at the top level and inside each endpoint are distinct attributes.
    let kdl = indoc! {r#"
        name "outer"
        endpoint {
            url "http://a"
            name "first"
        }
        endpoint {
            url "http://b"
            name "second"
        }
    "#};

    let relabel: Relabel = kdl_decode::from_str(kdl).unwrap();
    assert_eq!(relabel.name, "outer");
    assert_eq!(relabel.endpoints[0].name, "first");
    assert_eq!(relabel.endpoints[1].name, "second");
}

#[test]
fn errors_in_nested_bodies_point_inside_the_block() {
    let kdl = indoc! {r#"
        rule {
            action "keep"
            action "drop"
        }
    "#};

    let err = kdl_decode::from_str::<Relabel>(kdl).unwrap_err();
    let diagnostics = err.diagnostics().unwrap();
    assert_eq!(
        diagnostics[0].message,
        r#"attribute "action" may only be provided once"#
    );
    assert_eq!(diagnostics[0].start_pos.line, 3);
    assert_eq!(diagnostics[0].start_pos.column, 5);
}
