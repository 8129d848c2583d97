//! `PeerClient`: one method per peer management-API command.
//!
//! Every call is a signed GET against `<base>/client/api/`; a null,
//! absent, or undecodable response body is a transport failure, never a
//! partial success. Mutating calls hand back a [`JobRef`] consumed by the
//! polling helpers in [`crate::jobs`].

use crate::error::{PeerError, PeerResult};
use crate::signing;
use crate::types::{JobPoll, JobRef, JobStatus, PeerRegistration, PeerVm};
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(600);

/// Client bound to one peer management endpoint and key pair.
#[derive(Clone)]
pub struct PeerClient {
    http: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

impl PeerClient {
    /// `base_url` is the management root, e.g. `https://peer.example:8443`;
    /// the `/client/api/` suffix is fixed.
    pub fn new(base_url: &str, api_key: &str, secret_key: &str) -> PeerResult<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| PeerError::transport(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn api_base(&self) -> String {
        format!("{}/client/api/", self.base_url)
    }

    /// Issue one signed command and return the unwrapped
    /// `<command>response` object.
    pub async fn call(&self, command: &str, params: &[(String, String)]) -> PeerResult<Value> {
        let url = signing::build_signed_url(
            &self.api_base(),
            command,
            params,
            &self.api_key,
            &self.secret_key,
        );
        debug!("peer command {}", command);
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PeerError::transport(format!(
                "command {} returned {}",
                command, status
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PeerError::transport(format!("command {} body: {}", command, e)))?;
        let key = format!("{}response", command.to_lowercase());
        body.get(&key)
            .cloned()
            .ok_or_else(|| PeerError::transport(format!("command {} missing '{}'", command, key)))
    }

    fn job_ref(command: &str, response: &Value) -> PeerResult<JobRef> {
        match response.get("jobid") {
            Some(Value::String(s)) => Ok(JobRef(s.clone())),
            Some(Value::Number(n)) => Ok(JobRef(n.to_string())),
            _ => Err(PeerError::transport(format!(
                "command {} returned no job id",
                command
            ))),
        }
    }

    fn params(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ── Topology ────────────────────────────────────────────────────

    /// Ordered daemon candidate addresses of the peer site.
    pub async fn list_scvm_addresses(&self) -> PeerResult<Vec<String>> {
        let resp = self.call("listScvmIpAddress", &[]).await?;
        let joined = resp
            .pointer("/scvmipaddress/ipaddress")
            .and_then(Value::as_str)
            .ok_or_else(|| PeerError::transport("scvm address list missing"))?;
        Ok(joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    // ── DR registration ─────────────────────────────────────────────

    /// Register this site on the peer. Returns the async job when the
    /// peer processes the registration asynchronously.
    pub async fn create_dr_registration(
        &self,
        params: &[(String, String)],
    ) -> PeerResult<Option<JobRef>> {
        let resp = self.call("createDisasterRecoveryCluster", params).await?;
        Ok(Self::job_ref("createDisasterRecoveryCluster", &resp).ok())
    }

    pub async fn update_dr_registration(&self, params: &[(String, String)]) -> PeerResult<()> {
        self.call("updateDisasterRecoveryCluster", params).await?;
        Ok(())
    }

    pub async fn delete_dr_registration(&self, id: &str) -> PeerResult<()> {
        self.call(
            "deleteDisasterRecoveryCluster",
            &Self::params(&[("id", id)]),
        )
        .await?;
        Ok(())
    }

    pub async fn list_dr_registrations(&self) -> PeerResult<Vec<PeerRegistration>> {
        let resp = self.call("getDisasterRecoveryClusterList", &[]).await?;
        let rows = resp
            .get("disasterrecoverycluster")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(rows)
            .map_err(|e| PeerError::transport(format!("registration list: {e}")))
    }

    /// Remove the peer's record of one mirrored VM. Used row-by-row when a
    /// cluster is disabled; each deletion is independent.
    pub async fn delete_dr_vm_record(&self, vm_id: &str) -> PeerResult<()> {
        self.call(
            "deleteDisasterRecoveryClusterVm",
            &Self::params(&[("virtualmachineid", vm_id)]),
        )
        .await?;
        Ok(())
    }

    // ── Resource listing ────────────────────────────────────────────

    /// Generic list command (`listServiceOfferings`, `listNetworks`, ...).
    pub async fn list_resources(
        &self,
        command: &str,
        filters: &[(String, String)],
    ) -> PeerResult<Value> {
        self.call(command, filters).await
    }

    pub async fn list_virtual_machines(
        &self,
        name: Option<&str>,
    ) -> PeerResult<Vec<PeerVm>> {
        let params = match name {
            Some(n) => Self::params(&[("name", n)]),
            None => Vec::new(),
        };
        let resp = self.call("listVirtualMachines", &params).await?;
        let rows = resp
            .get("virtualmachine")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(rows).map_err(|e| PeerError::transport(format!("vm list: {e}")))
    }

    // ── Provisioning ────────────────────────────────────────────────

    pub async fn create_volume(&self, params: &[(String, String)]) -> PeerResult<JobRef> {
        let resp = self.call("createVolume", params).await?;
        Self::job_ref("createVolume", &resp)
    }

    pub async fn update_volume(&self, params: &[(String, String)]) -> PeerResult<JobRef> {
        let resp = self.call("updateVolume", params).await?;
        Self::job_ref("updateVolume", &resp)
    }

    pub async fn attach_volume(&self, params: &[(String, String)]) -> PeerResult<JobRef> {
        let resp = self.call("attachVolume", params).await?;
        Self::job_ref("attachVolume", &resp)
    }

    /// Deploy the placeholder VM that owns an already-provisioned ROOT
    /// volume on the peer side.
    pub async fn deploy_vm_for_volume(&self, params: &[(String, String)]) -> PeerResult<JobRef> {
        let resp = self.call("deployVirtualMachineForVolume", params).await?;
        Self::job_ref("deployVirtualMachineForVolume", &resp)
    }

    pub async fn start_vm(&self, vm_id: &str) -> PeerResult<JobRef> {
        let resp = self
            .call("startVirtualMachine", &Self::params(&[("id", vm_id)]))
            .await?;
        Self::job_ref("startVirtualMachine", &resp)
    }

    pub async fn stop_vm(&self, vm_id: &str) -> PeerResult<JobRef> {
        let resp = self
            .call("stopVirtualMachine", &Self::params(&[("id", vm_id)]))
            .await?;
        Self::job_ref("stopVirtualMachine", &resp)
    }

    // ── Job polling ─────────────────────────────────────────────────

    pub async fn query_async_job_result(&self, job: &JobRef) -> PeerResult<JobPoll> {
        let resp = self
            .call(
                "queryAsyncJobResult",
                &Self::params(&[("jobid", job.as_str())]),
            )
            .await?;
        let code = resp
            .get("jobstatus")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let error_text = resp
            .pointer("/jobresult/errortext")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(JobPoll {
            status: JobStatus::from_code(code),
            result: resp.get("jobresult").cloned().unwrap_or(Value::Null),
            error_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_normalises_trailing_slash() {
        let a = PeerClient::new("https://peer.example:8443/", "ak", "sk").unwrap();
        let b = PeerClient::new("https://peer.example:8443", "ak", "sk").unwrap();
        assert_eq!(a.api_base(), "https://peer.example:8443/client/api/");
        assert_eq!(a.api_base(), b.api_base());
    }

    #[test]
    fn job_ref_accepts_string_and_number_ids() {
        let s = serde_json::json!({"jobid": "job-9"});
        assert_eq!(PeerClient::job_ref("x", &s).unwrap(), JobRef("job-9".into()));
        let n = serde_json::json!({"jobid": 42});
        assert_eq!(PeerClient::job_ref("x", &n).unwrap(), JobRef("42".into()));
        let none = serde_json::json!({});
        assert!(PeerClient::job_ref("x", &none).is_err());
    }
}
