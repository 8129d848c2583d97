//! HTTP surface of the glue storage-mirroring daemon.
//!
//! Paths are preserved bit-exact from the daemon's API
//! (`/glue`, `/mirror`, `/mirror/rbd`, `/mirror/image/...`,
//! `/mirror/garbage`, `/service/{name}`). Authentication is the daemon's
//! fixed header pair; TLS validation is disabled because the daemon serves
//! a self-signed certificate on the storage network, matching the original
//! deployment. Transport errors and non-2xx statuses both collapse to
//! [`GlueError::Unavailable`].

use crate::error::{GlueError, GlueResult};
use crate::types::{GlueHealth, MirrorDaemonHealth, MirrorImageStatus, MirroredImageList};
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use std::time::Duration;

const GLUE_PORT: u16 = 8080;
const MEDIA_TYPE: &str = "application/vnd.ceph.api.v1.0+json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(600);

/// Pool-pairing parameters for `POST /mirror`.
#[derive(Debug, Clone)]
pub struct PairSetupRequest {
    pub local_cluster_name: String,
    pub remote_cluster_name: String,
    pub mirror_pool: String,
    /// Daemon contact address of the remote site.
    pub host: String,
}

impl Default for PairSetupRequest {
    fn default() -> Self {
        Self {
            local_cluster_name: "local".into(),
            remote_cluster_name: "remote".into(),
            mirror_pool: "rbd".into(),
            host: String::new(),
        }
    }
}

/// Client for one daemon candidate address.
pub struct GlueClient {
    http: Client,
    base_url: String,
}

impl GlueClient {
    /// Build a client for `https://<address>:8080/api/v1`.
    pub fn new(address: &str) -> GlueResult<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| GlueError::unavailable(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            base_url: format!("https://{}:{}/api/v1", address, GLUE_PORT),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, sub_url: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, sub_url))
            .header("Accept", MEDIA_TYPE)
            .header("Authorization", MEDIA_TYPE)
    }

    /// First 2xx wins; everything else is "unavailable".
    async fn send(&self, rb: RequestBuilder, what: &str) -> GlueResult<reqwest::Response> {
        let resp = rb.send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(GlueError::unavailable(format!(
                "{} returned {}",
                what, status
            )))
        }
    }

    async fn send_json(&self, rb: RequestBuilder, what: &str) -> GlueResult<serde_json::Value> {
        let resp = self.send(rb, what).await?;
        resp.json()
            .await
            .map_err(|e| GlueError::unavailable(format!("{} body: {}", what, e)))
    }

    async fn send_unit(&self, rb: RequestBuilder, what: &str) -> GlueResult<()> {
        self.send(rb, what).await.map(|_| ())
    }

    // ── Daemon / cluster health ─────────────────────────────────────

    /// `GET /glue`
    pub async fn health(&self) -> GlueResult<GlueHealth> {
        let body = self.send_json(self.request(Method::GET, "/glue"), "glue status").await?;
        let health = body.get("health").cloned().unwrap_or(body);
        Ok(serde_json::from_value(health).unwrap_or(GlueHealth {
            status: String::new(),
        }))
    }

    /// `GET /mirror`
    pub async fn mirror_health(&self) -> GlueResult<MirrorDaemonHealth> {
        let body = self
            .send_json(self.request(Method::GET, "/mirror"), "mirror status")
            .await?;
        serde_json::from_value(body)
            .map_err(|e| GlueError::unavailable(format!("mirror status body: {e}")))
    }

    // ── Cluster pairing ─────────────────────────────────────────────

    /// `POST /mirror` — multipart carrying the connection parameters plus
    /// the remote site's private key file.
    pub async fn pair_setup(
        &self,
        req: &PairSetupRequest,
        private_key: Vec<u8>,
    ) -> GlueResult<()> {
        let form = Form::new()
            .text("localClusterName", req.local_cluster_name.clone())
            .text("remoteClusterName", req.remote_cluster_name.clone())
            .text("mirrorPool", req.mirror_pool.clone())
            .text("host", req.host.clone())
            .part(
                "privateKeyFile",
                Part::bytes(private_key).file_name("glue.key"),
            );
        debug!("pairing mirror pool '{}' with {}", req.mirror_pool, req.host);
        self.send_unit(
            self.request(Method::POST, "/mirror").multipart(form),
            "mirror setup",
        )
        .await
    }

    /// `PUT /mirror` — push the mirror snapshot interval to the daemon.
    pub async fn pair_update(&self, interval: &str, host: &str) -> GlueResult<()> {
        let form = Form::new()
            .text("mirrorPool", "rbd")
            .text("interval", interval.to_string())
            .text("host", host.to_string());
        self.send_unit(
            self.request(Method::PUT, "/mirror").multipart(form),
            "mirror update",
        )
        .await
    }

    /// `DELETE /mirror`
    pub async fn pair_remove(&self, host: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(Method::DELETE, "/mirror")
                .query(&[("mirrorPool", "rbd"), ("host", host)]),
            "mirror remove",
        )
        .await
    }

    // ── Pool-level mirroring ────────────────────────────────────────

    /// `POST /mirror/rbd`
    pub async fn pool_mirror_enable(&self) -> GlueResult<()> {
        self.send_unit(self.request(Method::POST, "/mirror/rbd"), "pool enable")
            .await
    }

    /// `DELETE /mirror/rbd`
    pub async fn pool_mirror_disable(&self) -> GlueResult<()> {
        self.send_unit(self.request(Method::DELETE, "/mirror/rbd"), "pool disable")
            .await
    }

    /// `DELETE /mirror/garbage` — idempotent storage reclamation.
    pub async fn pool_garbage_collect(&self) -> GlueResult<()> {
        self.send_unit(
            self.request(Method::DELETE, "/mirror/garbage"),
            "garbage collect",
        )
        .await
    }

    // ── Per-image operations ────────────────────────────────────────

    /// `GET /mirror/image/rbd`
    pub async fn list_mirrored_images(&self) -> GlueResult<MirroredImageList> {
        let body = self
            .send_json(self.request(Method::GET, "/mirror/image/rbd"), "image list")
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_default())
    }

    /// `GET /mirror/image/status/rbd/{image}` — decoded once, here.
    pub async fn image_status(&self, image: &str) -> GlueResult<MirrorImageStatus> {
        let body = self
            .send_json(
                self.request(
                    Method::GET,
                    &format!("/mirror/image/status/rbd/{}", image),
                ),
                "image status",
            )
            .await?;
        Ok(MirrorImageStatus::from_wire(&body))
    }

    /// `POST /mirror/image/rbd/{image}` — put one image under mirroring
    /// with a snapshot schedule.
    pub async fn image_mirror_enable(
        &self,
        image: &str,
        interval: &str,
        start_time: Option<&str>,
    ) -> GlueResult<()> {
        let mut form = Form::new().text("interval", interval.to_string());
        if let Some(start) = start_time {
            form = form.text("startTime", start.to_string());
        }
        self.send_unit(
            self.request(Method::POST, &format!("/mirror/image/rbd/{}", image))
                .multipart(form),
            "image mirror enable",
        )
        .await
    }

    /// `DELETE /mirror/image/rbd/{image}` — tear the mirror relationship
    /// down. First success across candidates, never retried.
    pub async fn image_delete(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(Method::DELETE, &format!("/mirror/image/rbd/{}", image)),
            "image delete",
        )
        .await
    }

    /// `POST /mirror/image/promote/rbd/{image}`
    pub async fn image_promote(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(Method::POST, &format!("/mirror/image/promote/rbd/{}", image)),
            "image promote",
        )
        .await
    }

    /// `POST /mirror/image/promote/peer/rbd/{image}`
    pub async fn image_promote_peer(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(
                Method::POST,
                &format!("/mirror/image/promote/peer/rbd/{}", image),
            ),
            "image promote peer",
        )
        .await
    }

    /// `DELETE /mirror/image/demote/rbd/{image}`
    pub async fn image_demote(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(
                Method::DELETE,
                &format!("/mirror/image/demote/rbd/{}", image),
            ),
            "image demote",
        )
        .await
    }

    /// `DELETE /mirror/image/demote/peer/rbd/{image}`
    pub async fn image_demote_peer(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(
                Method::DELETE,
                &format!("/mirror/image/demote/peer/rbd/{}", image),
            ),
            "image demote peer",
        )
        .await
    }

    /// `PUT /mirror/image/resync/rbd/{image}`
    pub async fn image_resync(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(Method::PUT, &format!("/mirror/image/resync/rbd/{}", image)),
            "image resync",
        )
        .await
    }

    /// `PUT /mirror/image/resync/peer/rbd/{image}`
    pub async fn image_resync_peer(&self, image: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(
                Method::PUT,
                &format!("/mirror/image/resync/peer/rbd/{}", image),
            ),
            "image resync peer",
        )
        .await
    }

    /// `POST /mirror/image/snapshot/rbd/{vmName}` — manual mirror snapshot
    /// of the named VM's images.
    pub async fn image_snapshot(&self, vm_name: &str, images: &[String]) -> GlueResult<()> {
        self.send_unit(
            self.request(
                Method::POST,
                &format!("/mirror/image/snapshot/rbd/{}", vm_name),
            )
            .json(&serde_json::json!({ "imageList": images })),
            "image snapshot",
        )
        .await
    }

    // ── Service control ─────────────────────────────────────────────

    /// `POST /service/{name}` — restart a daemon-side service unit.
    pub async fn restart_daemon_service(&self, name: &str) -> GlueResult<()> {
        self.send_unit(
            self.request(Method::POST, &format!("/service/{}", name)),
            "service restart",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_has_fixed_port_and_prefix() {
        let client = GlueClient::new("10.10.1.11").unwrap();
        assert_eq!(client.base_url(), "https://10.10.1.11:8080/api/v1");
    }

    #[test]
    fn pair_setup_defaults_match_the_daemon_contract() {
        let req = PairSetupRequest::default();
        assert_eq!(req.local_cluster_name, "local");
        assert_eq!(req.remote_cluster_name, "remote");
        assert_eq!(req.mirror_pool, "rbd");
    }

    #[tokio::test]
    async fn unreachable_daemon_collapses_to_unavailable() {
        // Reserved TEST-NET address; the connect attempt fails fast enough
        // for a unit test because nothing routes there.
        let client = GlueClient::new("192.0.2.1").unwrap();
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let quick = GlueClient {
            http,
            base_url: client.base_url().to_string(),
        };
        let out = quick.pool_garbage_collect().await;
        assert!(matches!(out, Err(GlueError::Unavailable(_))));
    }
}
