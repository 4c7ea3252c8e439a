use std::{collections::HashSet, fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;
use provider_tools::{AcquireRequest, CancelOutcome, ProviderAdapter, ProviderApiError, ProviderRegistry};
use smb_common::{Money, ServerId, UserId};
use tokio::sync::Mutex;

use crate::{
    broker_api::{
        abuse,
        config::BrokerConfig,
        errors::BrokerError,
        order_objects::{CancelResult, NumberLease, OtpPoll, SweepReport, TopUpResult},
        pricing,
    },
    db_types::{NewOrder, Order, OrderStatusType},
    events::{EventProducers, OrderAnnulledEvent, OrderCreatedEvent, OtpReceivedEvent, UserBlockedEvent},
    queue::SingleFlightQueue,
    traits::BrokerDatabase,
};

/// `OrderFlowApi` is the primary API of the broker engine. It drives the order state machine: leasing numbers,
/// polling for OTPs, cancelling, confirming top-ups and sweeping orders near their deadline.
///
/// Acquire, cancel and top-up confirmation each run through their own [`SingleFlightQueue`], so same-class
/// operations execute strictly one at a time in submission order. That is what makes two simultaneous cancels of
/// the same order incapable of a double refund, and two simultaneous acquires incapable of racing the same vendor
/// slot. Operations of different classes interleave freely.
///
/// The queues are per-process. Running several engine instances against one database would need a shared
/// serialization primitive instead.
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    providers: ProviderRegistry,
    config: BrokerConfig,
    acquire_queue: SingleFlightQueue,
    cancel_queue: SingleFlightQueue,
    top_up_queue: SingleFlightQueue,
    producers: EventProducers,
    /// Orders that already have a sweep task (deferred or in flight) this pass. Guarantees at most one upstream
    /// cancel per order per pass even when sweep passes overlap.
    sweep_marks: Arc<Mutex<HashSet<i64>>>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, providers: ProviderRegistry, config: BrokerConfig, producers: EventProducers) -> Self {
        Self {
            db,
            providers,
            config,
            acquire_queue: SingleFlightQueue::new("acquire"),
            cancel_queue: SingleFlightQueue::new("cancel"),
            top_up_queue: SingleFlightQueue::new("top_up"),
            producers,
            sweep_marks: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: BrokerDatabase
{
    /// Lease a number for the given service on the given server. Runs on the acquire queue.
    ///
    /// Preconditions, checked in order: site not under maintenance, server configured and not under maintenance,
    /// user exists and is not blocked, service purchasable, wallet covers the resolved price. Only then is the
    /// vendor called; only after the vendor succeeds are the wallet debit, the Active order and the Debit ledger
    /// entry committed in one transaction. A vendor failure mutates nothing.
    pub async fn acquire_number(
        &self,
        user_id: &UserId,
        service: &str,
        server: ServerId,
    ) -> Result<NumberLease, BrokerError> {
        let this = self.clone();
        let user_id = user_id.clone();
        let service = service.to_string();
        self.acquire_queue.run(async move { this.acquire_inner(user_id, service, server).await }).await?
    }

    async fn acquire_inner(self, user_id: UserId, service: String, server: ServerId) -> Result<NumberLease, BrokerError> {
        if self.db.site_maintenance().await? {
            return Err(BrokerError::Maintenance);
        }
        let server_entry = self.db.fetch_server(server).await?.ok_or(BrokerError::Maintenance)?;
        if server_entry.maintenance {
            return Err(BrokerError::Maintenance);
        }
        let user =
            self.db.fetch_user(&user_id).await?.ok_or_else(|| BrokerError::UserNotFound(user_id.clone()))?;
        if user.blocked {
            return Err(BrokerError::Blocked);
        }
        let svc = self.db.fetch_service(&service, server).await?.ok_or(BrokerError::NoStock)?;
        let discounts = self.db.fetch_discounts(&user_id, &service, server).await?;
        let price = pricing::resolve_price(svc.price, &discounts);
        if user.balance < price {
            debug!("🔄️📦️ User {user_id} cannot afford {service} on server {server} at {price}");
            return Err(BrokerError::LowBalance);
        }
        let adapter = self.adapter_for(server)?;
        let acq = adapter.acquire(&AcquireRequest::new(&svc.code).with_max_price(svc.price)).await?;
        let order = NewOrder {
            user_id: user_id.clone(),
            service,
            server,
            price,
            number_id: acq.number_id.clone(),
            phone_number: acq.phone_number,
            expires_at: Utc::now() + self.config.order_ttl,
        };
        let order = match self.db.process_new_order(order).await {
            Ok(order) => order,
            Err(e) => {
                // The vendor hold is already placed. Release it so the slot does not leak; best effort only.
                warn!("🔄️📦️ Could not store the order for user {user_id} ({e}). Releasing the vendor hold");
                let number_id = acq.number_id;
                tokio::spawn(async move {
                    if let Err(e) = adapter.cancel(&number_id).await {
                        warn!("🔄️📦️ Releasing vendor hold {number_id} failed: {e}");
                    }
                });
                return Err(e.into());
            },
        };
        debug!(
            "🔄️📦️ Order #{} created: number {} on server {server} for user {user_id} at {price}",
            order.id, order.phone_number
        );
        self.call_order_created_hook(&order).await;
        Ok(NumberLease {
            order_id: order.id,
            phone_number: order.phone_number,
            price,
            expires_at: order.expires_at,
        })
    }

    /// Check for an OTP on an order. Not queued: polling is read-mostly and racing polls converge on the same
    /// stored record thanks to the idempotent attach.
    ///
    /// Returns an empty OTP while the code has not arrived. The first non-empty code moves the order to Finished
    /// and fires the OTP event exactly once. A Finished order is still polled upstream, because the multi-SMS
    /// vendors can deliver further codes after the first; a new code is stored as an additional record, and the
    /// latest stored code is the fallback when the vendor has nothing new (or has released the activation).
    pub async fn poll_otp(&self, user_id: &UserId, order_id: i64) -> Result<OtpPoll, BrokerError> {
        let order = self.fetch_owned_order(user_id, order_id).await?;
        match order.status {
            OrderStatusType::Active => {},
            OrderStatusType::Finished => return self.poll_finished_order(&order).await,
            OrderStatusType::Cancelled | OrderStatusType::Expired => {
                return Err(BrokerError::OrderNotFound(order_id));
            },
        }
        let adapter = self.adapter_for(order.server)?;
        match adapter.poll(&order.number_id).await? {
            None => Ok(OtpPoll::waiting()),
            Some(otp) => {
                let first = self.db.attach_otp(order.id, &otp).await?;
                if first {
                    debug!("🔄️📨️ First OTP arrived for order #{}", order.id);
                    let mut finished = order;
                    finished.status = OrderStatusType::Finished;
                    self.call_otp_received_hook(&finished, &otp).await;
                }
                Ok(OtpPoll::received(otp))
            },
        }
    }

    async fn poll_finished_order(&self, order: &Order) -> Result<OtpPoll, BrokerError> {
        let adapter = self.adapter_for(order.server)?;
        match adapter.poll(&order.number_id).await {
            Ok(Some(otp)) => {
                if self.db.attach_otp(order.id, &otp).await? {
                    debug!("🔄️📨️ Follow-up OTP arrived for order #{}", order.id);
                }
                Ok(OtpPoll::received(otp))
            },
            Ok(None) | Err(ProviderApiError::AlreadyCancelled) => {
                let otps = self.db.fetch_otps(order.id).await?;
                let last = otps.into_iter().last().map(|o| OtpPoll::received(o.otp));
                Ok(last.unwrap_or_else(OtpPoll::waiting))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel an Active order and refund the wallet. Runs on the cancel queue.
    ///
    /// Preconditions: the order is Active, the minimum hold period has elapsed, and no OTP is on record. If the
    /// vendor reports a code slipped in concurrently, the order Finishes instead, with no refund. A successful
    /// cancel feeds the abuse detector; blocking, if it happens, does not affect this cancel's outcome.
    pub async fn cancel_order(&self, user_id: &UserId, order_id: i64) -> Result<CancelResult, BrokerError> {
        let this = self.clone();
        let user_id = user_id.clone();
        self.cancel_queue.run(async move { this.cancel_inner(user_id, order_id).await }).await?
    }

    async fn cancel_inner(self, user_id: UserId, order_id: i64) -> Result<CancelResult, BrokerError> {
        let order = self.fetch_owned_order(&user_id, order_id).await?;
        if order.status != OrderStatusType::Active {
            return Err(BrokerError::OrderNotFound(order_id));
        }
        let now = Utc::now();
        if order.age(now) < self.config.cancel_hold {
            debug!("🔄️❌️ Order #{order_id} is only {}s old. Too early to cancel", order.age(now).num_seconds());
            return Err(BrokerError::TooEarlyToCancel);
        }
        if !self.db.fetch_otps(order.id).await?.is_empty() {
            return Err(BrokerError::OtpAlreadyReceived);
        }
        let adapter = self.adapter_for(order.server)?;
        let outcome = match adapter.cancel(&order.number_id).await {
            Ok(outcome) => outcome,
            Err(ProviderApiError::AlreadyCancelled) => CancelOutcome::AlreadyCancelled,
            Err(e) => return Err(e.into()),
        };
        if outcome == CancelOutcome::OtpReceived {
            self.finish_on_late_otp(&order, &adapter).await?;
            return Err(BrokerError::OtpAlreadyReceived);
        }
        match self.db.annul_order(order.id, OrderStatusType::Cancelled, true).await? {
            Some(order) => {
                debug!("🔄️❌️ Order #{order_id} cancelled. {} refunded to user {user_id}", order.price);
                self.call_order_annulled_hook(&order, true).await;
                self.apply_abuse_policy(&user_id).await;
                Ok(CancelResult { refunded: true })
            },
            // Someone else retired the order between our fetch and the update. The money moved exactly once.
            None => Ok(CancelResult { refunded: false }),
        }
    }

    /// The vendor refused the cancel because an SMS already arrived. Capture the code if we can; either way the
    /// order Finishes with no refund.
    async fn finish_on_late_otp(
        &self,
        order: &Order,
        adapter: &Arc<dyn ProviderAdapter>,
    ) -> Result<(), BrokerError> {
        info!("🔄️❌️ Order #{} has an OTP upstream; finishing it instead of cancelling", order.id);
        match adapter.poll(&order.number_id).await {
            Ok(Some(otp)) => {
                let first = self.db.attach_otp(order.id, &otp).await?;
                if first {
                    let mut finished = order.clone();
                    finished.status = OrderStatusType::Finished;
                    self.call_otp_received_hook(&finished, &otp).await;
                }
            },
            Ok(None) | Err(_) => {
                // Could not read the code back; still terminal, still no refund.
                self.db.annul_order(order.id, OrderStatusType::Finished, false).await?;
            },
        }
        Ok(())
    }

    /// Credit the wallet for an externally verified payment. Runs on the top-up queue; idempotent on `txid`.
    pub async fn confirm_top_up(
        &self,
        user_id: &UserId,
        txid: &str,
        amount: Money,
    ) -> Result<TopUpResult, BrokerError> {
        let this = self.clone();
        let user_id = user_id.clone();
        let txid = txid.to_string();
        self.top_up_queue
            .run(async move {
                let credited = this.db.confirm_top_up(&user_id, &txid, amount).await?;
                let user = this
                    .db
                    .fetch_user(&user_id)
                    .await?
                    .ok_or_else(|| BrokerError::UserNotFound(user_id.clone()))?;
                Ok(TopUpResult { credited, balance: user.balance })
            })
            .await?
    }

    /// One sweep pass over orders near their deadline. Idempotent per call; safe to run from a timer.
    ///
    /// Orders whose deadline is further out than the buffer get a deferred task that fires at
    /// `expires_at - buffer`; orders already inside the buffer are retired now. Both paths run the same system
    /// cancel on the cancel queue that a manual cancel uses, so the two paths cannot race against one order.
    pub async fn sweep_once(&self) -> Result<SweepReport, BrokerError> {
        let now = Utc::now();
        let horizon = now + self.config.sweep_interval + self.config.sweep_buffer;
        let candidates = self.db.expiring_orders(horizon).await?;
        let mut report = SweepReport { examined: candidates.len(), ..Default::default() };
        trace!("🕰️ Sweep pass: {} order(s) inside the horizon", report.examined);
        for order in candidates {
            if !self.mark_swept(order.id).await {
                continue;
            }
            let fire_in = order.time_left(now) - self.config.sweep_buffer;
            if fire_in > Duration::zero() {
                report.deferred += 1;
                let this = self.clone();
                let delay = fire_in.to_std().unwrap_or_default();
                trace!("🕰️ Order #{} gets a deferred cancel in {}s", order.id, fire_in.num_seconds());
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    this.retire_order(order.id).await;
                    this.clear_sweep_mark(order.id).await;
                });
            } else {
                match self.run_system_cancel(order.id).await {
                    Ok(true) => report.retired += 1,
                    Ok(false) => {},
                    Err(e) => {
                        warn!("🕰️ End-of-life cancel for order #{} failed: {e}. It stays Active", order.id);
                        report.failed += 1;
                    },
                }
                self.clear_sweep_mark(order.id).await;
            }
        }
        Ok(report)
    }

    async fn retire_order(&self, order_id: i64) {
        match self.run_system_cancel(order_id).await {
            Ok(true) => debug!("🕰️ Order #{order_id} retired at end of life"),
            Ok(false) => trace!("🕰️ Order #{order_id} reached a terminal state on its own"),
            Err(e) => {
                warn!("🕰️ End-of-life cancel for order #{order_id} failed: {e}. It stays Active for the next sweep")
            },
        }
    }

    /// Runs the system-side expiry of one order on the cancel queue. Returns whether the order was retired by
    /// this call.
    async fn run_system_cancel(&self, order_id: i64) -> Result<bool, BrokerError> {
        let this = self.clone();
        self.cancel_queue.run(async move { this.expire_inner(order_id).await }).await?
    }

    async fn expire_inner(self, order_id: i64) -> Result<bool, BrokerError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(BrokerError::OrderNotFound(order_id))?;
        // The deferred task may fire long after scheduling; the order state decides, not the schedule.
        if order.status != OrderStatusType::Active {
            return Ok(false);
        }
        let adapter = self.adapter_for(order.server)?;
        let outcome = match adapter.cancel(&order.number_id).await {
            Ok(outcome) => outcome,
            Err(ProviderApiError::AlreadyCancelled) => CancelOutcome::AlreadyCancelled,
            Err(e) => return Err(e.into()),
        };
        if outcome == CancelOutcome::OtpReceived {
            self.finish_on_late_otp(&order, &adapter).await?;
            return Ok(true);
        }
        // An Active order cannot have a stored OTP, so the expiry refunds like a cancel does.
        match self.db.annul_order(order.id, OrderStatusType::Expired, true).await? {
            Some(order) => {
                debug!("🕰️ Order #{} expired. {} refunded to user {}", order.id, order.price, order.user_id);
                self.call_order_annulled_hook(&order, true).await;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn apply_abuse_policy(&self, user_id: &UserId) {
        if let Err(e) = self.check_cancel_abuse(user_id).await {
            // The cancel already succeeded; abuse bookkeeping must not undo that.
            warn!("🚫️ Abuse check for user {user_id} failed: {e}");
        }
    }

    async fn check_cancel_abuse(&self, user_id: &UserId) -> Result<(), BrokerError> {
        let threshold = self.config.abuse_threshold;
        let cancels = self.db.recent_cancellations(user_id, threshold as i64).await?;
        let now = Utc::now();
        if !abuse::exceeds_cancel_threshold(&cancels, threshold, self.config.abuse_window, now) {
            return Ok(());
        }
        if self.db.abuse_rule_disarmed(abuse::CANCEL_ABUSE_RULE).await? {
            debug!("🚫️ User {user_id} crossed the cancel threshold but the rule is disarmed");
            return Ok(());
        }
        self.db.block_user(user_id, abuse::BLOCK_REASON).await?;
        warn!("🚫️ User {user_id} blocked: {} cancellations inside the abuse window", threshold);
        self.call_user_blocked_hook(user_id).await;
        Ok(())
    }

    async fn fetch_owned_order(&self, user_id: &UserId, order_id: i64) -> Result<Order, BrokerError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(BrokerError::OrderNotFound(order_id))?;
        // Another user's order is indistinguishable from a missing one.
        if &order.user_id != user_id {
            return Err(BrokerError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    fn adapter_for(&self, server: ServerId) -> Result<Arc<dyn ProviderAdapter>, BrokerError> {
        self.providers
            .adapter(server)
            .ok_or_else(|| BrokerError::UpstreamError(format!("No adapter is registered for server {server}")))
    }

    async fn mark_swept(&self, order_id: i64) -> bool {
        self.sweep_marks.lock().await.insert(order_id)
    }

    async fn clear_sweep_mark(&self, order_id: i64) {
        self.sweep_marks.lock().await.remove(&order_id);
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_otp_received_hook(&self, order: &Order, otp: &str) {
        for emitter in &self.producers.otp_received_producer {
            emitter.publish_event(OtpReceivedEvent::new(order.clone(), otp.to_string())).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order, refunded: bool) {
        for emitter in &self.producers.order_annulled_producer {
            emitter.publish_event(OrderAnnulledEvent::new(order.clone(), refunded)).await;
        }
    }

    async fn call_user_blocked_hook(&self, user_id: &UserId) {
        for emitter in &self.producers.user_blocked_producer {
            emitter.publish_event(UserBlockedEvent::new(user_id.clone(), abuse::BLOCK_REASON)).await;
        }
    }
}
