//! gRPC client for the fleetmon manager

use anyhow::{Context, Result};
use fleetmon_api::fleetmon::v1::query_service_client::QueryServiceClient;
use fleetmon_api::fleetmon::v1::*;
use tonic::transport::Channel;

/// Query client wrapping the generated stub.
pub struct FleetClient {
    client: QueryServiceClient<Channel>,
}

impl FleetClient {
    /// Connect to the manager's query service.
    pub async fn connect(addr: &str) -> Result<Self> {
        let client = QueryServiceClient::connect(format!("http://{addr}"))
            .await
            .context("Failed to connect to fleetmond. Is the manager running?")?;
        Ok(Self { client })
    }

    pub async fn query_performance(
        &mut self,
        request: QueryPerformanceRequest,
    ) -> Result<QueryPerformanceResponse> {
        Ok(self.client.query_performance(request).await?.into_inner())
    }

    pub async fn query_trend(&mut self, request: QueryTrendRequest) -> Result<QueryTrendResponse> {
        Ok(self.client.query_trend(request).await?.into_inner())
    }

    pub async fn query_anomaly(
        &mut self,
        request: QueryAnomalyRequest,
    ) -> Result<QueryAnomalyResponse> {
        Ok(self.client.query_anomaly(request).await?.into_inner())
    }

    pub async fn query_score_rank(
        &mut self,
        request: QueryScoreRankRequest,
    ) -> Result<QueryScoreRankResponse> {
        Ok(self.client.query_score_rank(request).await?.into_inner())
    }

    pub async fn query_latest_score(
        &mut self,
        request: QueryLatestScoreRequest,
    ) -> Result<QueryLatestScoreResponse> {
        Ok(self.client.query_latest_score(request).await?.into_inner())
    }

    pub async fn query_net_detail(
        &mut self,
        request: QueryDetailRequest,
    ) -> Result<QueryNetDetailResponse> {
        Ok(self.client.query_net_detail(request).await?.into_inner())
    }

    pub async fn query_disk_detail(
        &mut self,
        request: QueryDetailRequest,
    ) -> Result<QueryDiskDetailResponse> {
        Ok(self.client.query_disk_detail(request).await?.into_inner())
    }

    pub async fn query_mem_detail(
        &mut self,
        request: QueryDetailRequest,
    ) -> Result<QueryMemDetailResponse> {
        Ok(self.client.query_mem_detail(request).await?.into_inner())
    }

    pub async fn query_soft_irq_detail(
        &mut self,
        request: QueryDetailRequest,
    ) -> Result<QuerySoftIrqDetailResponse> {
        Ok(self.client.query_soft_irq_detail(request).await?.into_inner())
    }

    pub async fn query_cpu_core_detail(
        &mut self,
        request: QueryDetailRequest,
    ) -> Result<QueryCpuCoreDetailResponse> {
        Ok(self.client.query_cpu_core_detail(request).await?.into_inner())
    }
}
