//! Client for the fleet inventory service.

use crate::api::inventory::{
    resource_name, strip_collection, Asset, CreateAssetRequest, CreateMachineLseRequest,
    CreateRackRequest, GetRequest, MachineLse, Rack, UpdateMachineLseRequest, ASSET_COLLECTION,
    MACHINE_LSE_COLLECTION, RACK_COLLECTION,
};
use crate::prpc::{PrpcClient, PrpcError};
use tracing::{event, Level};

pub const FLEET_SERVICE: &str = "unifiedfleet.api.v1.rpc.Fleet";

#[derive(Debug, Clone)]
pub struct InventoryClient {
    prpc: PrpcClient,
}

impl InventoryClient {
    pub fn new(prpc: PrpcClient) -> Self {
        InventoryClient { prpc }
    }

    /// Turn a NOT_FOUND status into `None`.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        name: String,
    ) -> Result<Option<T>, PrpcError> {
        match self
            .prpc
            .call(FLEET_SERVICE, method, &GetRequest { name: name.clone() })
            .await
        {
            Ok(entity) => Ok(Some(entity)),
            Err(e) if e.is_not_found() => {
                event!(Level::DEBUG, %name, "Entity does not exist");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_rack(&self, id: &str) -> Result<Option<Rack>, PrpcError> {
        self.get("GetRack", resource_name(RACK_COLLECTION, id)).await
    }

    pub async fn add_rack(&self, mut rack: Rack) -> Result<Rack, PrpcError> {
        let rack_id = strip_collection(&rack.name).to_string();
        rack.name = resource_name(RACK_COLLECTION, &rack_id);
        self.prpc
            .call(FLEET_SERVICE, "CreateRack", &CreateRackRequest { rack, rack_id })
            .await
    }

    pub async fn get_asset(&self, id: &str) -> Result<Option<Asset>, PrpcError> {
        self.get("GetAsset", resource_name(ASSET_COLLECTION, id)).await
    }

    pub async fn add_asset(&self, mut asset: Asset) -> Result<Asset, PrpcError> {
        asset.name = resource_name(ASSET_COLLECTION, &asset.name);
        if let Some(ref mut location) = asset.location {
            if !location.rack.is_empty() {
                location.rack = strip_collection(&location.rack).to_string();
            }
        }
        self.prpc
            .call(FLEET_SERVICE, "CreateAsset", &CreateAssetRequest { asset })
            .await
    }

    pub async fn get_machine_lse(&self, id: &str) -> Result<Option<MachineLse>, PrpcError> {
        self.get("GetMachineLSE", resource_name(MACHINE_LSE_COLLECTION, id))
            .await
    }

    pub async fn create_machine_lse(&self, mut lse: MachineLse) -> Result<MachineLse, PrpcError> {
        let machine_lse_id = strip_collection(&lse.name).to_string();
        lse.name = resource_name(MACHINE_LSE_COLLECTION, &machine_lse_id);
        self.prpc
            .call(
                FLEET_SERVICE,
                "CreateMachineLSE",
                &CreateMachineLseRequest {
                    machine_lse: lse,
                    machine_lse_id,
                },
            )
            .await
    }

    pub async fn update_machine_lse(
        &self,
        mut lse: MachineLse,
        paths: &[&str],
    ) -> Result<MachineLse, PrpcError> {
        lse.name = resource_name(MACHINE_LSE_COLLECTION, &lse.name);
        self.prpc
            .call(
                FLEET_SERVICE,
                "UpdateMachineLSE",
                &UpdateMachineLseRequest {
                    machine_lse: lse,
                    update_mask: paths.join(","),
                },
            )
            .await
    }
}
