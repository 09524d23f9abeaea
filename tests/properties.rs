//! Properties of parsing, rendering and scoping over generated queries.

use promql_scope::*;
use proptest::prelude::*;

fn arb_metric() -> impl Strategy<Value = String> {
	prop_oneof![
		Just("up".to_string()),
		Just("http_requests_total".to_string()),
		Just("node_cpu_seconds_total".to_string()),
		Just("job:requests:rate5m".to_string()),
	]
}

fn arb_matcher() -> impl Strategy<Value = String> {
	(
		prop_oneof![Just("job"), Just("instance"), Just("env")],
		prop_oneof![Just("="), Just("!="), Just("=~"), Just("!~")],
		"[a-z0-9.]{0,6}",
	)
		.prop_map(|(name, op, value)| format!("{name}{op}\"{value}\""))
}

fn arb_selector() -> impl Strategy<Value = String> {
	(
		prop::option::of(arb_metric()),
		prop::collection::vec(arb_matcher(), 0..3),
	)
		.prop_map(|(name, matchers)| match (name, matchers.is_empty()) {
			(Some(name), true) => name,
			(Some(name), false) => format!("{}{{{}}}", name, matchers.join(",")),
			(None, true) => "{job=\"node\"}".to_string(),
			(None, false) => format!("{{{}}}", matchers.join(", ")),
		})
}

fn arb_leaf() -> impl Strategy<Value = String> {
	prop_oneof![
		arb_selector(),
		arb_selector().prop_map(|s| format!("{s} offset 5m")),
		(prop_oneof![Just("rate"), Just("delta"), Just("max_over_time")], arb_selector())
			.prop_map(|(f, s)| format!("{f}({s}[5m])")),
		(0u32..1000).prop_map(|n| n.to_string()),
	]
}

fn arb_binary_op() -> impl Strategy<Value = &'static str> {
	prop_oneof![
		Just("+"),
		Just("-"),
		Just("*"),
		Just("/"),
		Just("%"),
		Just("^"),
		Just("=="),
		Just("> bool"),
		Just("<="),
		Just("and"),
		Just("or"),
		Just("unless"),
		Just("/ on (job)"),
		Just("* ignoring (instance) group_left (env)"),
	]
}

fn arb_expr(depth: u32) -> BoxedStrategy<String> {
	let leaf = arb_leaf().boxed();
	if depth == 0 {
		return leaf;
	}
	let recursive = prop_oneof![
		(arb_expr(depth - 1), arb_binary_op(), arb_expr(depth - 1)).prop_map(|(x, op, y)| format!("{x} {op} {y}")),
		arb_expr(depth - 1).prop_map(|x| format!("({x})")),
		arb_expr(depth - 1).prop_map(|x| format!("-{x}")),
		arb_expr(depth - 1).prop_map(|x| format!("sum({x}) by (job)")),
		arb_expr(depth - 1).prop_map(|x| format!("topk(3, {x})")),
		arb_expr(depth - 1).prop_map(|x| format!("abs({x})")),
		arb_expr(depth - 1).prop_map(|x| format!("avg_over_time(({x})[1h:1m])")),
	];
	prop_oneof![leaf, recursive].boxed()
}

fn prod() -> Scope {
	Scope::new()
		.with("cluster", "prod")
		.unwrap()
		.with("org", "acme")
		.unwrap()
}

fn parsed(query: &str) -> Node {
	parse(query, ParserOptions::default()).unwrap_or_else(|err| panic!("{query:?}: {err}"))
}

proptest! {
	#[test]
	fn rendering_round_trips(query in arb_expr(3)) {
		let ast = parsed(&query);
		let text = render(&ast);
		prop_assert_eq!(parse(&text, ParserOptions::default()), Ok(ast), "{}", text);
	}

	#[test]
	fn injection_is_idempotent(query in arb_expr(3)) {
		let once = inject(&parsed(&query), &prod()).unwrap();
		let twice = inject(&once, &prod()).unwrap();
		prop_assert_eq!(&twice, &once);
		prop_assert_eq!(parse(&render(&once), ParserOptions::default()), Ok(once));
	}

	#[test]
	fn every_selector_is_scoped(query in arb_expr(3)) {
		let ast = parsed(&query);
		let scoped = inject(&ast, &prod()).unwrap();
		let vectors = scoped.vectors();
		prop_assert_eq!(vectors.len(), ast.vectors().len());
		for vector in vectors {
			for constraint in prod().constraints() {
				prop_assert!(
					vector.labels.contains(&LabelMatch::equal(&constraint.label, &constraint.value)),
					"{} is missing {}", vector, constraint
				);
			}
		}
	}

	#[test]
	fn escapes_are_rejected(
		query in arb_expr(2),
		op in prop_oneof![Just("!="), Just("=~"), Just("!~"), Just("=")],
		value in "[a-z.*]{0,5}",
		left in any::<bool>(),
	) {
		prop_assume!(!(op == "=" && value == "prod"));
		let escape = format!("up{{cluster{op}\"{value}\"}}");
		let query = if left { format!("{escape} or {query}") } else { format!("{query} or {escape}") };
		let err = parse_and_scope(&query, &prod(), ParserOptions::default()).unwrap_err();
		prop_assert!(matches!(err, Error::Scope(_)), "{}", err);
	}
}
