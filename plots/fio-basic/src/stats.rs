use common::{
    config::Variable,
    util::{Summary, parse_request_size},
};
use fio::{ParamValue, Record, RETAINED_PERCENTILES};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// `None` for experiments without a varying parameter
    pub key: Option<ParamValue>,
    pub count: usize,
    pub write: Summary,
    pub read: Summary,
    pub total: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileStats {
    pub percentile: f64,
    pub latency: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub groups: Vec<GroupStats>,
    pub latency: Option<Vec<PercentileStats>>,
}

impl GroupStats {
    fn of(key: Option<ParamValue>, records: &[&Record]) -> Self {
        let write = records.iter().map(|x| x.write_bw).collect::<Vec<_>>();
        let read = records.iter().map(|x| x.read_bw).collect::<Vec<_>>();
        let total = records.iter().map(|x| x.total_bw()).collect::<Vec<_>>();
        Self {
            key,
            count: records.len(),
            write: Summary::of(&write),
            read: Summary::of(&read),
            total: Summary::of(&total),
        }
    }

    pub fn label(&self) -> String {
        self.key.as_ref().map(|x| x.to_string()).unwrap_or_default()
    }
}

pub fn aggregate(records: &[Record], variable: Option<&Variable>) -> AggregatedStats {
    match variable {
        Some(variable) => AggregatedStats {
            groups: grouped(records, variable),
            latency: None,
        },
        None => AggregatedStats {
            groups: vec![GroupStats::of(None, &records.iter().collect::<Vec<_>>())],
            latency: Some(latency_stats(records)),
        },
    }
}

fn grouped(records: &[Record], variable: &Variable) -> Vec<GroupStats> {
    let mut groups: Vec<(ParamValue, Vec<&Record>)> = Vec::new();
    for record in records {
        let Some(key) = &record.param else {
            continue;
        };
        match groups.iter_mut().find(|(k, _)| k == key) {
            Some((_, members)) => members.push(record),
            None => groups.push((key.clone(), vec![record])),
        }
    }
    debug!("{} groups for {}", groups.len(), variable.name);

    let groups = match &variable.order {
        Some(order) => order_by_list(groups, order),
        None => groups
            .into_iter()
            .sorted_by(|a, b| a.0.natural_cmp(&b.0))
            .collect(),
    };
    groups
        .into_iter()
        .map(|(key, members)| GroupStats::of(Some(key), &members))
        .collect()
}

/// Listed values first, in list order. Values missing from the list follow,
/// by request size where they parse as one, otherwise lexicographically.
fn order_by_list<T>(
    groups: Vec<(ParamValue, T)>,
    order: &[String],
) -> Vec<(ParamValue, T)> {
    let position = |key: &ParamValue| order.iter().position(|x| *x == key.to_string());
    let (mut listed, unlisted): (Vec<_>, Vec<_>) =
        groups.into_iter().partition(|(k, _)| position(k).is_some());
    listed.sort_by_key(|(k, _)| position(k));

    for (key, _) in &unlisted {
        warn!("{key} is not in the canonical order, placing it last");
    }
    let unlisted = unlisted.into_iter().sorted_by(|(a, _), (b, _)| {
        let size = |x: &ParamValue| parse_request_size(&x.to_string()).ok();
        match (size(a), size(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.natural_cmp(b),
        }
    });
    listed.into_iter().chain(unlisted).collect()
}

fn latency_stats(records: &[Record]) -> Vec<PercentileStats> {
    RETAINED_PERCENTILES
        .iter()
        .map(|p| {
            let values = records
                .iter()
                .filter_map(|r| r.latency.as_ref())
                .flat_map(|l| l.iter().filter(|x| x.percentile == *p))
                .map(|x| x.latency_ns)
                .collect::<Vec<_>>();
            PercentileStats {
                percentile: *p,
                latency: Summary::of(&values),
            }
        })
        .collect()
}
