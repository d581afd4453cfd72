use clap::ValueEnum;
use recall_index::Metric;
use recall_upstream::UpstreamMode;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum MetricFlag {
    Euclidean,
    Cosine,
}

impl MetricFlag {
    pub(crate) const fn as_domain(self) -> Metric {
        match self {
            MetricFlag::Euclidean => Metric::Euclidean,
            MetricFlag::Cosine => Metric::Cosine,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum UpstreamFlag {
    #[value(name = "openai")]
    OpenAi,
    Stub,
}

impl UpstreamFlag {
    pub(crate) const fn as_domain(self) -> UpstreamMode {
        match self {
            UpstreamFlag::OpenAi => UpstreamMode::OpenAi,
            UpstreamFlag::Stub => UpstreamMode::Stub,
        }
    }
}
