// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `brainsurgeon prune` and `brainsurgeon restore`.
//!
//! Both publish a request as the extension would. With `--wait` the command
//! also runs a dispatch loop for the matching response. That loop consumes
//! every pending response of the same kind, so `--wait` should not be used
//! while a real extension process is reading responses from the same file.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use brainsurgeon_bus::{BusSettings, MessageBus, ProtocolClient};
use brainsurgeon_config::BrainsurgeonConfig;
use brainsurgeon_core::{
    BrainsurgeonError, PruneRequest, PruneResponse, RestoreRequest, RestoreResponse, Source,
};
use brainsurgeon_storage::SqliteMessageStore;

async fn open_bus(config: &BrainsurgeonConfig) -> Result<(Arc<MessageBus>, Arc<SqliteMessageStore>), BrainsurgeonError> {
    let store = Arc::new(SqliteMessageStore::open(&config.storage).await?);
    let bus = Arc::new(MessageBus::new(
        store.clone(),
        Source::Extension,
        BusSettings::from(&config.bus),
    ));
    Ok((bus, store))
}

pub(crate) fn describe_prune(response: &PruneResponse) -> Result<String, BrainsurgeonError> {
    if response.success {
        Ok(format!(
            "pruned {}/{}: {} tool output(s) externalized",
            response.agent_id, response.session_id, response.externalized
        ))
    } else {
        Err(BrainsurgeonError::handler(format!(
            "prune of {}/{} failed: {}",
            response.agent_id,
            response.session_id,
            response.error.as_deref().unwrap_or("unknown error")
        )))
    }
}

pub(crate) fn describe_restore(response: &RestoreResponse) -> Result<String, BrainsurgeonError> {
    if response.success {
        Ok(format!(
            "restored {} in {}/{}",
            response.tool_call_id, response.agent_id, response.session_id
        ))
    } else {
        Err(BrainsurgeonError::handler(format!(
            "restore of {} in {}/{} failed: {}",
            response.tool_call_id,
            response.agent_id,
            response.session_id,
            response.error.as_deref().unwrap_or("unknown error")
        )))
    }
}

pub async fn run_prune(
    config: &BrainsurgeonConfig,
    agent: String,
    session: String,
    threshold: Option<u32>,
    wait: Option<u64>,
) -> Result<(), BrainsurgeonError> {
    let (bus, store) = open_bus(config).await?;
    let request = PruneRequest {
        agent_id: agent,
        session_id: session,
        threshold,
    };

    let Some(secs) = wait else {
        let message = bus.publish(request).await?;
        println!("queued prune request {}", message.id);
        return store.close().await;
    };

    let client = ProtocolClient::attach(bus.clone());
    bus.start().await?;
    let outcome = client.prune(request, Duration::from_secs(secs)).await;
    bus.stop().await;
    client.detach();
    store.close().await?;

    let response = outcome?;
    debug!(?response, "prune response received");
    println!("{}", describe_prune(&response)?);
    Ok(())
}

pub async fn run_restore(
    config: &BrainsurgeonConfig,
    agent: String,
    session: String,
    tool_call: String,
    wait: Option<u64>,
) -> Result<(), BrainsurgeonError> {
    let (bus, store) = open_bus(config).await?;
    let request = RestoreRequest {
        agent_id: agent,
        session_id: session,
        tool_call_id: tool_call,
    };

    let Some(secs) = wait else {
        let message = bus.publish(request).await?;
        println!("queued restore request {}", message.id);
        return store.close().await;
    };

    let client = ProtocolClient::attach(bus.clone());
    bus.start().await?;
    let outcome = client.restore(request, Duration::from_secs(secs)).await;
    bus.stop().await;
    client.detach();
    store.close().await?;

    let response = outcome?;
    debug!(?response, "restore response received");
    println!("{}", describe_restore(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainsurgeon_core::{MessageStore, MessageType};

    fn config_in(dir: &std::path::Path) -> BrainsurgeonConfig {
        let mut config = BrainsurgeonConfig::default();
        config.storage.database_path = dir.join("bus.db").to_string_lossy().into_owned();
        config.bus.poll_interval_ms = 20;
        config
    }

    #[test]
    fn prune_outcomes_render() {
        let request = PruneRequest {
            agent_id: "main".into(),
            session_id: "s1".into(),
            threshold: None,
        };
        let ok = describe_prune(&PruneResponse::succeeded(&request, 3)).unwrap();
        assert_eq!(ok, "pruned main/s1: 3 tool output(s) externalized");
        let err = describe_prune(&PruneResponse::failed(&request, "transcript not found"))
            .unwrap_err();
        assert!(err.to_string().contains("transcript not found"));
    }

    #[test]
    fn restore_failure_is_an_error() {
        let request = RestoreRequest {
            agent_id: "main".into(),
            session_id: "s1".into(),
            tool_call_id: "call_b".into(),
        };
        assert!(describe_restore(&RestoreResponse::succeeded(&request)).is_ok());
        let err = describe_restore(&RestoreResponse::failed(&request, "externalized content not found"))
            .unwrap_err();
        assert!(err.to_string().contains("call_b"));
    }

    #[tokio::test]
    async fn fire_and_forget_leaves_request_queued() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        run_prune(&config, "main".into(), "s1".into(), Some(2), None)
            .await
            .unwrap();

        let store = SqliteMessageStore::open(&config.storage).await.unwrap();
        let pending = store.list_unprocessed().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message_type(), MessageType::PruneRequest);
        assert_eq!(pending[0].source, Source::Extension);
    }

    #[tokio::test]
    async fn waiting_without_a_worker_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let err = run_restore(&config, "main".into(), "s1".into(), "t1".into(), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, BrainsurgeonError::Timeout { .. }));
    }
}
