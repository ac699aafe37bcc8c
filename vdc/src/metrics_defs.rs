use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Number of requests served. Tagged with route.",
};

pub const DAL_QUERY_DURATION: MetricDef = MetricDef {
    name: "dal.query.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting for the dal query call in seconds, including failed calls.",
};

pub const DAL_FALLBACKS: MetricDef = MetricDef {
    name: "dal.fallbacks",
    metric_type: MetricType::Counter,
    description: "Number of dal answers replaced by the mock response. Tagged with reason.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, DAL_QUERY_DURATION, DAL_FALLBACKS];
