//! Batch runs over stub backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use aisert_core::{
    AisertConfig, BackendError, BackendRegistry, Content, Embedder, EmbedderFactory, Plan, Step,
    TokenCounter, TokenCounterFactory, ValidationContext, ValidatorKind,
};
use aisert_runtime::BatchRunner;
use serde_json::json;

struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str, _ctx: &ValidationContext) -> Result<usize, BackendError> {
        Ok(text.chars().count())
    }

    fn name(&self) -> &str {
        "chars"
    }
}

#[derive(Default)]
struct SlowCounterFactory {
    created: AtomicUsize,
}

impl TokenCounterFactory for SlowCounterFactory {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn create(
        &self,
        _model: &str,
        _encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(25));
        Ok(Arc::new(CharCounter))
    }
}

struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn encode(&self, text: &str, _ctx: &ValidationContext) -> Result<Vec<f32>, BackendError> {
        Ok(vec![1.0, text.len() as f32 / 100.0])
    }

    fn model(&self) -> &str {
        "length"
    }
}

#[derive(Default)]
struct LengthFactory {
    created: AtomicUsize,
}

impl EmbedderFactory for LengthFactory {
    fn create(&self, _model: &str) -> Result<Arc<dyn Embedder>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(25));
        Ok(Arc::new(LengthEmbedder))
    }
}

/// Counter whose remote end never answers in time.
struct HungCounter;

impl TokenCounter for HungCounter {
    fn count(&self, _text: &str, _ctx: &ValidationContext) -> Result<usize, BackendError> {
        thread::sleep(Duration::from_millis(800));
        Ok(0)
    }

    fn name(&self) -> &str {
        "hung"
    }
}

struct HungFactory;

impl TokenCounterFactory for HungFactory {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn create(
        &self,
        _model: &str,
        _encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        Ok(Arc::new(HungCounter))
    }
}

fn plan() -> Plan {
    Plan::new(vec![
        Step::Contains {
            items: json!(["order"]),
            invert: false,
        },
        Step::Tokens { limit: 40 },
        Step::Semantic {
            reference: "Your order has shipped.".to_string(),
            threshold: 0.5,
        },
    ])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backends_created_once_across_sessions() {
    let counters = Arc::new(SlowCounterFactory::default());
    let embedders = Arc::new(LengthFactory::default());
    let registry = Arc::new(
        BackendRegistry::isolated()
            .with_counter(counters.clone())
            .with_embedder(embedders.clone()),
    );

    let runner = BatchRunner::new(registry, AisertConfig::default(), 8);
    let contents: Vec<Content> = (0..24)
        .map(|i| Content::from(format!("Your order #{i} has shipped.")))
        .collect();

    let reports = runner.run(contents, &plan()).await.unwrap();

    assert_eq!(reports.len(), 24);
    assert!(reports.iter().all(|r| r.passed()));
    assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    assert_eq!(embedders.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failures_are_reported_per_content() {
    let registry = Arc::new(
        BackendRegistry::isolated()
            .with_counter(Arc::new(SlowCounterFactory::default()))
            .with_embedder(Arc::new(LengthFactory::default())),
    );
    let runner = BatchRunner::new(registry, AisertConfig::default(), 2);

    let contents = vec![
        Content::from("Your order has shipped."),
        Content::from("Nothing to see here, but this sentence runs well past the budget."),
    ];
    let reports = runner.run(contents, &plan()).await.unwrap();

    assert!(reports[0].passed());
    assert!(!reports[1].passed());

    let failed: Vec<ValidatorKind> = reports[1].failures().into_iter().map(|(k, _)| k).collect();
    assert_eq!(failed, vec![ValidatorKind::Contains, ValidatorKind::Token]);
}

#[tokio::test]
async fn test_cancelled_batch_records_interruptions() {
    let registry = Arc::new(
        BackendRegistry::isolated()
            .with_counter(Arc::new(SlowCounterFactory::default()))
            .with_embedder(Arc::new(LengthFactory::default())),
    );
    let runner = BatchRunner::new(registry, AisertConfig::default(), 2);
    runner.cancellation().cancel();

    let reports = runner
        .run(vec![Content::from("Your order has shipped.")], &plan())
        .await
        .unwrap();

    let report = &reports[0];
    assert!(report.rule("ContainsValidator").unwrap().status());
    assert_eq!(
        report.rule("TokenValidator").unwrap().reason(),
        "validation cancelled"
    );
    assert_eq!(
        report.rule("SemanticValidator").unwrap().reason(),
        "validation cancelled"
    );
}

#[tokio::test]
async fn test_deadline_abandons_hung_backends() {
    let registry = Arc::new(BackendRegistry::isolated().with_counter(Arc::new(HungFactory)));
    let runner = BatchRunner::new(registry, AisertConfig::default(), 2)
        .with_deadline(Duration::from_millis(50));
    let tokens_only = Plan::new(vec![Step::Tokens { limit: 40 }]);
    let started = Instant::now();

    let reports = runner
        .run(
            vec![Content::from("first"), Content::from("second")],
            &tokens_only,
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(600));
    for report in &reports {
        assert_eq!(
            report.rule("TokenValidator").unwrap().reason(),
            "validation deadline exceeded"
        );
    }
}

#[tokio::test]
async fn test_strict_plan_stops_each_session_early() {
    let registry = Arc::new(
        BackendRegistry::isolated()
            .with_counter(Arc::new(SlowCounterFactory::default()))
            .with_embedder(Arc::new(LengthFactory::default())),
    );
    let runner = BatchRunner::new(registry, AisertConfig::default(), 2);

    let reports = runner
        .run(vec![Content::from("no match")], &plan().strict(true))
        .await
        .unwrap();

    assert!(!reports[0].passed());
    assert_eq!(reports[0].rules.len(), 1);
}
