//! Synthesize pod status from runtime inspection.
//!
//! | runtime state | phase   | ready | startedAt           |
//! |---------------|---------|-------|---------------------|
//! | `running`     | Running | true  | pod create time     |
//! | `exited`      | Failed  | false | now                 |
//! | other         | Unknown | false | now                 |
//!
//! The pod phase is whatever the last container in the record maps to;
//! with no containers the phase stays unset.

use chrono::{DateTime, Utc};

use podlet_core::pod::{
    ConditionStatus, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStatus, PodCondition, PodConditionType, PodPhase, PodStatus,
};
use podlet_runtime::{ContainerLifecycle, RuntimePodRecord};

/// Project a runtime pod record onto a pod status as of `now`.
pub fn project(record: &RuntimePodRecord, now: DateTime<Utc>) -> PodStatus {
    let mut status = PodStatus {
        start_time: Some(now),
        conditions: [
            PodConditionType::Initialized,
            PodConditionType::Ready,
            PodConditionType::PodScheduled,
        ]
        .into_iter()
        .map(|type_| PodCondition {
            type_,
            status: ConditionStatus::True,
        })
        .collect(),
        ..Default::default()
    };

    for container in &record.containers {
        let (state, ready, phase) = match container.lifecycle() {
            ContainerLifecycle::Running => (
                ContainerState {
                    running: Some(ContainerStateRunning {
                        started_at: Some(record.config.created.unwrap_or(now)),
                    }),
                    ..Default::default()
                },
                true,
                PodPhase::Running,
            ),
            ContainerLifecycle::Exited => (terminated_at(now), false, PodPhase::Failed),
            ContainerLifecycle::Other(_) => (terminated_at(now), false, PodPhase::Unknown),
        };

        status.phase = Some(phase);
        status.container_statuses.push(ContainerStatus {
            name: container.id.clone(),
            container_id: container.id.clone(),
            ready,
            state,
            ..Default::default()
        });
    }

    status
}

fn terminated_at(now: DateTime<Utc>) -> ContainerState {
    ContainerState {
        terminated: Some(ContainerStateTerminated {
            started_at: Some(now),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use podlet_runtime::RuntimeContainerRecord;

    use super::*;

    fn record(states: &[&str]) -> RuntimePodRecord {
        let mut record = RuntimePodRecord::default();
        record.config.created = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        record.containers = states
            .iter()
            .enumerate()
            .map(|(i, s)| RuntimeContainerRecord {
                id: format!("c{}", i),
                state: s.to_string(),
            })
            .collect();
        record
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_all_running() {
        let status = project(&record(&["running", "running"]), now());
        assert_eq!(status.phase, Some(PodPhase::Running));
        assert_eq!(status.container_statuses.len(), 2);
        assert!(status.container_statuses.iter().all(|c| c.ready));
    }

    #[test]
    fn test_running_started_at_is_pod_creation() {
        let rec = record(&["running"]);
        let status = project(&rec, now());
        let running = status.container_statuses[0].state.running.as_ref().unwrap();
        assert_eq!(running.started_at, rec.config.created);
    }

    #[test]
    fn test_last_container_decides_phase() {
        let status = project(&record(&["running", "exited"]), now());
        assert_eq!(status.phase, Some(PodPhase::Failed));

        let status = project(&record(&["exited", "running"]), now());
        assert_eq!(status.phase, Some(PodPhase::Running));
    }

    #[test]
    fn test_exited_container() {
        let status = project(&record(&["exited"]), now());
        let cs = &status.container_statuses[0];
        assert!(!cs.ready);
        let terminated = cs.state.terminated.as_ref().unwrap();
        assert_eq!(terminated.started_at, Some(now()));
        assert!(cs.state.running.is_none());
    }

    #[test]
    fn test_unknown_state() {
        let status = project(&record(&["running", "paused"]), now());
        assert_eq!(status.phase, Some(PodPhase::Unknown));
        assert!(!status.container_statuses[1].ready);
    }

    #[test]
    fn test_no_containers_leaves_phase_unset() {
        let status = project(&record(&[]), now());
        assert_eq!(status.phase, None);
        assert!(status.container_statuses.is_empty());
        assert_eq!(status.start_time, Some(now()));
    }

    #[test]
    fn test_conditions_reported() {
        let status = project(&record(&["running"]), now());
        assert_eq!(status.conditions.len(), 3);
        assert!(status
            .conditions
            .iter()
            .all(|c| c.status == ConditionStatus::True));
    }

    #[test]
    fn test_container_status_uses_runtime_id() {
        let status = project(&record(&["running"]), now());
        assert_eq!(status.container_statuses[0].name, "c0");
        assert_eq!(status.container_statuses[0].container_id, "c0");
    }
}
