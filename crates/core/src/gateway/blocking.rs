use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::domain::customs::{CustomsDeclaration, CustomsLineItem};
use crate::domain::shipment::{PurchasedLabel, RateId, ShipmentId};
use crate::gateway::{
    CustomsReference, Gateway, GatewayError, GatewayOperation, QuotedShipment, ShipmentRequest,
};

/// A synchronous provider SDK. Calls may block the current thread.
pub trait BlockingCarrierClient: Send + Sync + 'static {
    fn create_customs_item(&self, item: &CustomsLineItem) -> Result<CustomsReference, GatewayError>;

    fn create_customs_info(
        &self,
        declaration: &CustomsDeclaration,
        items: &[CustomsReference],
    ) -> Result<CustomsReference, GatewayError>;

    fn create_shipment(&self, request: &ShipmentRequest) -> Result<QuotedShipment, GatewayError>;

    fn retrieve_shipment(&self, id: &ShipmentId) -> Result<QuotedShipment, GatewayError>;

    fn buy_shipment(&self, id: &ShipmentId, rate: &RateId) -> Result<PurchasedLabel, GatewayError>;
}

/// Adapts a [`BlockingCarrierClient`] to the async [`Gateway`] trait.
///
/// Every call runs on the blocking thread pool and holds a worker permit until
/// the SDK call returns, even if the awaiting task has already timed out.
pub struct BlockingGateway<C> {
    client: Arc<C>,
    workers: Arc<Semaphore>,
}

impl<C: BlockingCarrierClient> BlockingGateway<C> {
    pub fn new(client: C, workers: usize) -> Self {
        Self { client: Arc::new(client), workers: Arc::new(Semaphore::new(workers.max(1))) }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn run<T, F>(&self, operation: GatewayOperation, call: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&C) -> Result<T, GatewayError> + Send + 'static,
    {
        let permit = Arc::clone(&self.workers).acquire_owned().await.map_err(|_| {
            GatewayError::Transport { operation, message: "blocking worker pool is closed".to_string() }
        })?;
        let client = Arc::clone(&self.client);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            call(&client)
        })
        .await
        .map_err(|error| GatewayError::Transport {
            operation,
            message: format!("blocking worker failed: {error}"),
        })?
    }
}

#[async_trait]
impl<C: BlockingCarrierClient> Gateway for BlockingGateway<C> {
    async fn create_customs_item(
        &self,
        item: &CustomsLineItem,
    ) -> Result<CustomsReference, GatewayError> {
        let item = item.clone();
        self.run(GatewayOperation::CreateCustomsItem, move |client| {
            client.create_customs_item(&item)
        })
        .await
    }

    async fn create_customs_info(
        &self,
        declaration: &CustomsDeclaration,
        items: &[CustomsReference],
    ) -> Result<CustomsReference, GatewayError> {
        let declaration = declaration.clone();
        let items = items.to_vec();
        self.run(GatewayOperation::CreateCustomsInfo, move |client| {
            client.create_customs_info(&declaration, &items)
        })
        .await
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<QuotedShipment, GatewayError> {
        let request = request.clone();
        self.run(GatewayOperation::CreateShipment, move |client| client.create_shipment(&request))
            .await
    }

    async fn retrieve_shipment(&self, id: &ShipmentId) -> Result<QuotedShipment, GatewayError> {
        let id = id.clone();
        self.run(GatewayOperation::RetrieveShipment, move |client| client.retrieve_shipment(&id))
            .await
    }

    async fn buy_shipment(
        &self,
        id: &ShipmentId,
        rate: &RateId,
    ) -> Result<PurchasedLabel, GatewayError> {
        let id = id.clone();
        let rate = rate.clone();
        self.run(GatewayOperation::BuyShipment, move |client| client.buy_shipment(&id, &rate))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::{BlockingCarrierClient, BlockingGateway};
    use crate::domain::customs::{CustomsDeclaration, CustomsLineItem};
    use crate::domain::shipment::{PurchasedLabel, Rate, RateId, ShipmentId};
    use crate::gateway::{
        CustomsReference, Gateway, GatewayError, GatewayOperation, QuotedShipment, ShipmentRequest,
    };

    #[derive(Default)]
    struct SlowClient {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowClient {
        fn enter(&self) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl BlockingCarrierClient for SlowClient {
        fn create_customs_item(
            &self,
            _item: &CustomsLineItem,
        ) -> Result<CustomsReference, GatewayError> {
            Ok(CustomsReference("cstitem_1".to_string()))
        }

        fn create_customs_info(
            &self,
            _declaration: &CustomsDeclaration,
            _items: &[CustomsReference],
        ) -> Result<CustomsReference, GatewayError> {
            Ok(CustomsReference("cstinfo_1".to_string()))
        }

        fn create_shipment(
            &self,
            _request: &ShipmentRequest,
        ) -> Result<QuotedShipment, GatewayError> {
            Err(GatewayError::Rejected {
                operation: GatewayOperation::CreateShipment,
                status: 422,
                message: "unused".to_string(),
            })
        }

        fn retrieve_shipment(&self, id: &ShipmentId) -> Result<QuotedShipment, GatewayError> {
            self.enter();
            Ok(QuotedShipment {
                id: id.clone(),
                rates: vec![Rate {
                    id: RateId("rate_1".to_string()),
                    carrier: "USPS".to_string(),
                    service: "Priority".to_string(),
                    cost: Decimal::new(850, 2),
                    currency: "USD".to_string(),
                    delivery_days: Some(2),
                }],
                label: None,
            })
        }

        fn buy_shipment(
            &self,
            _id: &ShipmentId,
            _rate: &RateId,
        ) -> Result<PurchasedLabel, GatewayError> {
            Err(GatewayError::Transport {
                operation: GatewayOperation::BuyShipment,
                message: "connection reset".to_string(),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_permits_bound_parallel_sdk_calls() {
        let gateway = std::sync::Arc::new(BlockingGateway::new(SlowClient::default(), 2));

        let tasks: Vec<_> = (0..8)
            .map(|index| {
                let gateway = std::sync::Arc::clone(&gateway);
                tokio::spawn(async move {
                    gateway.retrieve_shipment(&ShipmentId(format!("shp_{index}"))).await
                })
            })
            .collect();

        for task in tasks {
            let shipment = task.await.expect("task joins").expect("retrieve succeeds");
            assert_eq!(shipment.rates.len(), 1);
        }
        assert!(gateway.client().peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn sdk_errors_pass_through_unchanged() {
        let gateway = BlockingGateway::new(SlowClient::default(), 1);
        let error = gateway
            .buy_shipment(&ShipmentId("shp_1".to_string()), &RateId("rate_1".to_string()))
            .await
            .expect_err("buy fails");
        assert!(matches!(error, GatewayError::Transport { operation: GatewayOperation::BuyShipment, .. }));
    }
}
