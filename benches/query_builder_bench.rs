use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use site_query::{
    load, serialize, AppConfig, Combinator, CompilerConfig, Operator, QueryNode, QueryTree,
    SqlCompiler,
};
use std::hint::black_box;
use std::sync::Arc;

fn rule(field: &str, operator: Operator, value: &str) -> QueryNode {
    QueryNode::rule(field, operator, value, vec![])
}

// 构造不同规模的查询文档
fn test_cases() -> Vec<(&'static str, QueryNode)> {
    let simple = QueryNode::root(vec![QueryNode::site(
        "bbc",
        Some(QueryNode::group(
            Combinator::And,
            vec![rule("title", Operator::Contains, "election")],
        )),
    )]);

    let medium = QueryNode::root(vec![
        QueryNode::site(
            "bbc",
            Some(QueryNode::group(
                Combinator::Or,
                vec![
                    rule("title", Operator::Contains, "election"),
                    rule("section", Operator::Equals, "politics"),
                    rule("summary", Operator::Regex, "^Vote"),
                ],
            )),
        ),
        QueryNode::site(
            "hacker_news",
            Some(QueryNode::group(
                Combinator::And,
                vec![rule("title", Operator::RegexCaseInsensitive, "rust")],
            )),
        ),
    ]);

    let complex = QueryNode::root(
        ["bbc", "hacker_news", "the_guardian"]
            .iter()
            .map(|site| {
                let field = if *site == "the_guardian" { "headline" } else { "url" };
                let refinement = QueryNode::group(
                    Combinator::Or,
                    vec![
                        rule(field, Operator::Contains, "a"),
                        QueryNode::group(
                            Combinator::And,
                            vec![
                                rule(field, Operator::Regex, "b$"),
                                rule(field, Operator::Equals, "c"),
                            ],
                        ),
                    ],
                );
                QueryNode::site(
                    *site,
                    Some(QueryNode::group(
                        Combinator::And,
                        vec![
                            QueryNode::rule(field, Operator::Contains, "news", vec![refinement]),
                            rule("url", Operator::Contains, "https"),
                        ],
                    )),
                )
            })
            .collect(),
    );

    vec![("simple", simple), ("medium", medium), ("complex", complex)]
}

fn create_tree() -> QueryTree {
    let schema = AppConfig::demo().schema().expect("演示配置应该有效");
    QueryTree::new(Arc::new(schema))
}

// 基准测试：加载查询文档
fn benchmark_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_performance");

    for (name, doc) in test_cases() {
        group.bench_with_input(BenchmarkId::new("load", name), &doc, |b, doc| {
            let mut tree = create_tree();
            b.iter(|| {
                load(&mut tree, black_box(doc)).expect("加载应该成功");
                tree.drain_events();
            })
        });
    }

    group.finish();
}

// 基准测试：序列化
fn benchmark_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_performance");

    for (name, doc) in test_cases() {
        let mut tree = create_tree();
        load(&mut tree, &doc).expect("加载应该成功");

        group.bench_with_input(BenchmarkId::new("serialize", name), &tree, |b, tree| {
            b.iter(|| black_box(serialize(black_box(tree))))
        });
    }

    group.finish();
}

// 基准测试：SQL编译性能
fn benchmark_sql_compiler(c: &mut Criterion) {
    let config = AppConfig::demo();
    let schema = Arc::new(config.schema().expect("演示配置应该有效"));
    let compiler = SqlCompiler::from_config(schema, CompilerConfig::from(&config));

    let mut group = c.benchmark_group("sql_compiler_performance");

    for (name, doc) in test_cases() {
        group.bench_with_input(BenchmarkId::new("compile", name), &doc, |b, doc| {
            b.iter(|| match compiler.compile(black_box(doc)) {
                Ok(result) => black_box(result),
                Err(_) => panic!("编译失败"),
            })
        });
    }

    group.finish();
}

// 基准测试：完整的端到端处理
fn benchmark_end_to_end(c: &mut Criterion) {
    let config = AppConfig::demo();
    let mut group = c.benchmark_group("end_to_end_performance");

    for (name, doc) in test_cases() {
        let json = doc.to_json().expect("序列化应该成功");

        group.bench_with_input(BenchmarkId::new("full_pipeline", name), &json, |b, json| {
            b.iter(|| {
                let mut tree = create_tree();
                let doc = QueryNode::from_json(black_box(json)).expect("解析应该成功");
                load(&mut tree, &doc).expect("加载应该成功");
                let compiler =
                    SqlCompiler::from_config(Arc::clone(tree.schema()), CompilerConfig::from(&config));
                let result = compiler.compile_tree(&tree).expect("编译应该成功");
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_load,
    benchmark_serialize,
    benchmark_sql_compiler,
    benchmark_end_to_end
);
criterion_main!(benches);
