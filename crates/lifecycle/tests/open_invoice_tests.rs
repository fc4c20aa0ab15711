mod common;

use common::{Harness, ADDRESS, UNIT_PRICE};
use gateway::mock::MockGateway;
use lifecycle::{CancelOutcome, NotifierEvent, PurchaseRequest};
use rust_decimal_macros::dec;
use trx_broker_core::{BrokerError, FeeMethod, InvoiceStatus};

fn request(amount: rust_decimal::Decimal, fee_method: FeeMethod) -> PurchaseRequest {
    PurchaseRequest {
        owner_id: 42,
        crypto_amount: amount,
        fee_method,
        destination_address: ADDRESS.to_string(),
        extra: None,
    }
}

#[tokio::test]
async fn opening_prices_and_persists_pending_invoice() {
    let h = Harness::new();

    let opened = h
        .service
        .open_invoice(request(dec!(10), FeeMethod::FlatFiatFee))
        .await
        .unwrap();

    assert_eq!(opened.unit_price, UNIT_PRICE);
    assert_eq!(opened.price_due.fiat_amount, 102_000);
    assert_eq!(opened.price_due.delivered_crypto, dec!(10));
    assert!(opened.redirect_url.ends_with(&opened.invoice.external_ref));

    let stored = h.store.get(opened.invoice.id).unwrap();
    assert_eq!(stored.status, InvoiceStatus::Pending);
    assert_eq!(stored.fiat_amount, 102_000);
    assert_eq!(stored.crypto_amount, dec!(10));
    assert_eq!(stored.fee_method, FeeMethod::FlatFiatFee);
    assert_eq!(stored.owner_id, 42);
    assert!(!stored.external_ref.is_empty());
}

#[tokio::test]
async fn deducted_fee_charges_less_and_delivers_less() {
    let h = Harness::new();

    let opened = h
        .service
        .open_invoice(request(dec!(10), FeeMethod::DeductedFromCrypto))
        .await
        .unwrap();

    assert_eq!(opened.price_due.fiat_amount, 89_250);
    assert_eq!(opened.price_due.delivered_crypto, dec!(8.5));
    assert_eq!(opened.invoice.crypto_amount, dec!(10));
}

#[tokio::test]
async fn invalid_requests_never_reach_the_gateway() {
    let h = Harness::new();

    let err = h
        .service
        .open_invoice(request(dec!(1351), FeeMethod::FlatFiatFee))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidRequest(_)));

    let mut bad_address = request(dec!(5), FeeMethod::FlatFiatFee);
    bad_address.destination_address = "0xabc".to_string();
    assert!(matches!(
        h.service.open_invoice(bad_address).await,
        Err(BrokerError::InvalidRequest(_))
    ));

    assert_eq!(h.gateway.created_count(), 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn price_feed_outage_is_reported_and_stores_nothing() {
    let h = Harness::new();
    h.oracle.set_price(0);

    let err = h
        .service
        .open_invoice(request(dec!(10), FeeMethod::FlatFiatFee))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::UpstreamUnavailable(_)));
    assert!(err.is_retryable());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn gateway_refusal_leaves_no_record_but_reports_the_number() {
    let h = Harness::with_gateway(MockGateway::rejecting());

    let err = h
        .service
        .open_invoice(request(dec!(10), FeeMethod::FlatFiatFee))
        .await
        .unwrap_err();

    match err {
        BrokerError::InvoiceNotIssued { invoice_id, .. } => {
            assert!((10_000_000..=99_999_999).contains(&invoice_id.0));
            assert!(matches!(
                h.store.get(invoice_id),
                Err(BrokerError::InvoiceNotFound(_))
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn owner_cancel_retracts_prompt_and_notifies() {
    let h = Harness::new();
    let invoice = h.open_with_prompt(42, "prompt-1").await;

    let outcome = h.service.cancel(42, invoice.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Canceled { ref invoice } if invoice.status == InvoiceStatus::Canceled));

    assert_eq!(
        h.notifier.events()[0],
        NotifierEvent::Retracted {
            owner: 42,
            notification_ref: "prompt-1".to_string()
        }
    );
    assert_eq!(h.notifier.notices().len(), 1);

    let again = h.service.cancel(42, invoice.id).await.unwrap();
    assert_eq!(
        again,
        CancelOutcome::AlreadyFinal {
            status: InvoiceStatus::Canceled
        }
    );
    assert_eq!(h.notifier.events().len(), 2);
}

#[tokio::test]
async fn cancel_by_someone_else_is_refused() {
    let h = Harness::new();
    let invoice = h.open(42, dec!(3), FeeMethod::FlatFiatFee).await;

    let err = h.service.cancel(7, invoice.id).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotOwner(id) if id == invoice.id));
    assert_eq!(h.store.get(invoice.id).unwrap().status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn prompt_attached_after_finish_is_withdrawn_at_once() {
    let h = Harness::new();
    let invoice = h.open(42, dec!(3), FeeMethod::FlatFiatFee).await;
    h.service.cancel(42, invoice.id).await.unwrap();

    h.service
        .attach_notification(invoice.id, "late-prompt".to_string())
        .await
        .unwrap();

    assert_eq!(h.notifier.retractions(), 1);
}

#[tokio::test]
async fn history_is_paged_newest_first() {
    let h = Harness::new();
    let mut opened = Vec::new();
    for _ in 0..8 {
        opened.push(h.open(42, dec!(2), FeeMethod::FlatFiatFee).await);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    h.open(99, dec!(2), FeeMethod::FlatFiatFee).await;

    let first = h.service.history(42, 0).unwrap();
    assert_eq!(first.items.len(), 6);
    assert_eq!(first.items[0].id, opened[7].id);
    assert!(first.has_next);
    assert!(!first.has_previous);

    let second = h.service.history(42, 1).unwrap();
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.items[1].id, opened[0].id);
    assert!(!second.has_next);
}
