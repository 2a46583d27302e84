mod support;

use std::collections::HashSet;

use dalec::{
    application::refresh::{
        METRIC_CONTENTS_CREATED_TOTAL, METRIC_CONTENTS_PRUNED_TOTAL, METRIC_CONTENTS_UPDATED_TOTAL,
        METRIC_PROVIDER_FETCH_MS, METRIC_REFRESH_SKIPPED_TOTAL, METRIC_REFRESH_TOTAL,
    },
    config::ContentSettings,
    domain::scope::Scope,
};
use metrics_util::debugging::DebuggingRecorder;
use support::{STUB_APP, ScriptedProvider, harness, items};

#[tokio::test]
async fn refresh_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let h = harness(ScriptedProvider::new(items(0, 3)), ContentSettings::new());
    let scope = Scope::new(STUB_APP, "issue");
    h.engine.refresh(&scope, false).await.expect("refresh");
    h.engine.refresh(&scope, false).await.expect("fresh");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_REFRESH_TOTAL,
        METRIC_REFRESH_SKIPPED_TOTAL,
        METRIC_CONTENTS_CREATED_TOTAL,
        METRIC_CONTENTS_UPDATED_TOTAL,
        METRIC_CONTENTS_PRUNED_TOTAL,
        METRIC_PROVIDER_FETCH_MS,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
