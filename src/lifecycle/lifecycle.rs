use std::sync::Arc;
#[cfg(feature = "emitter")]
use std::sync::Mutex;

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RideResult;
use crate::ledger::{Change, Offer, OfferLedger};
use crate::notification::{NotificationKind, NotificationService};
use crate::repository::RequestRepository;
use crate::request::{Request, RequestDraft};
use crate::task::spawn_best_effort;

/// Store mirror whose request writes take turns.
#[derive(Clone)]
struct Mirror {
    repository: RequestRepository,
    turn: Arc<tokio::sync::Mutex<()>>,
}

/// Drives requests through their lifecycle.
///
/// Guards are checked synchronously against a scratch copy of the request
/// and then against the shared [`OfferLedger`], which applies the same
/// transition to its tracked head. Only when both pass is the caller's
/// request replaced (by the head, so concurrent copies converge) and the
/// side effects fired: notification, store mirror, local listeners. None
/// of those side effects are awaited.
///
/// Mirror writes run one at a time and always persist the ledger's latest
/// head, so the stored request ends up at the last committed state.
pub struct RequestLifecycle {
    ledger: OfferLedger,
    notifications: NotificationService,
    mirror: Option<Mirror>,
    #[cfg(feature = "emitter")]
    emitter: Option<Mutex<EventEmitter>>,
}

impl RequestLifecycle {
    pub fn new(notifications: NotificationService) -> Self {
        RequestLifecycle {
            ledger: OfferLedger::new(),
            notifications,
            mirror: None,
            #[cfg(feature = "emitter")]
            emitter: None,
        }
    }

    /// Share an existing ledger, e.g. between lifecycles on different tasks.
    pub fn with_ledger(mut self, ledger: OfferLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Mirror requests and offers to the store after each transition.
    pub fn with_mirror(mut self, repository: RequestRepository) -> Self {
        self.mirror = Some(Mirror {
            repository,
            turn: Arc::new(tokio::sync::Mutex::new(())),
        });
        self
    }

    /// Emit `request.<event>` with a JSON snapshot after each transition.
    #[cfg(feature = "emitter")]
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = Some(Mutex::new(emitter));
        self
    }

    pub fn ledger(&self) -> &OfferLedger {
        &self.ledger
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Make a request loaded from elsewhere known to the ledger.
    pub fn track(&self, request: &Request) -> RideResult<()> {
        self.ledger.adopt(request)
    }

    /// Validate a draft and open it under a fresh id. Nothing is written if validation fails.
    pub fn create(&self, draft: RequestDraft) -> RideResult<Request> {
        let request = Request::open(Uuid::new_v4().to_string(), draft)?;
        self.track(&request)?;

        self.mirror_request(&request);
        self.emit("request.opened", &request);
        debug!(request_id = request.id(), rider = request.rider(), "request opened");
        Ok(request)
    }

    /// Admit `driver`'s offer and tell the rider.
    pub fn submit_offer<'a>(&self, request: &'a mut Request, driver: &str) -> RideResult<&'a Request> {
        let mut next = request.clone();
        next.submit_offer(driver)?;
        let head = self
            .ledger
            .commit(next.id(), Change::Offer(driver), |head| head.submit_offer(driver))?;
        *request = head.unwrap_or(next);

        self.notifications
            .notify(request.rider(), request.id(), NotificationKind::OfferReceived);
        self.mirror_offer(Offer::new(request.id(), driver));
        self.mirror_request(request);
        self.emit("request.offer_submitted", request);
        debug!(request_id = request.id(), driver, "offer submitted");
        Ok(&*request)
    }

    /// Confirm `driver`, who must hold an offer. Exactly one confirm per request wins.
    pub fn confirm_driver<'a>(
        &self,
        request: &'a mut Request,
        driver: &str,
    ) -> RideResult<&'a Request> {
        let mut next = request.clone();
        next.confirm_driver(driver)?;
        let head = self
            .ledger
            .commit(next.id(), Change::Confirm(driver), |head| head.confirm_driver(driver))?;
        *request = head.unwrap_or(next);

        self.notifications
            .notify(driver, request.id(), NotificationKind::OfferAccepted);
        self.mirror_request(request);
        self.emit("request.driver_confirmed", request);
        debug!(request_id = request.id(), driver, "driver confirmed");
        Ok(&*request)
    }

    pub fn complete<'a>(&self, request: &'a mut Request) -> RideResult<&'a Request> {
        self.advance(request, "request.completed", Request::complete)
    }

    pub fn pay<'a>(&self, request: &'a mut Request) -> RideResult<&'a Request> {
        self.advance(request, "request.paid", Request::pay)
    }

    pub fn cancel<'a>(&self, request: &'a mut Request) -> RideResult<&'a Request> {
        self.advance(request, "request.cancelled", Request::cancel)
    }

    /// Complete, pay, and cancel all end the offer window.
    fn advance<'a, F>(
        &self,
        request: &'a mut Request,
        event: &'static str,
        transition: F,
    ) -> RideResult<&'a Request>
    where
        F: Fn(&mut Request) -> RideResult<()>,
    {
        let mut next = request.clone();
        transition(&mut next)?;
        let head = self
            .ledger
            .commit(next.id(), Change::Close(next.status()), &transition)?;
        *request = head.unwrap_or(next);

        self.mirror_request(request);
        self.emit(event, request);
        debug!(request_id = request.id(), status = %request.status(), "request advanced");
        Ok(&*request)
    }

    /// Persist the ledger's head for `request`, or `request` itself when untracked.
    fn mirror_request(&self, request: &Request) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        let ledger = self.ledger.clone();
        let fallback = request.clone();
        spawn_best_effort("save request", async move {
            let _turn = mirror.turn.lock().await;
            let head = ledger.head(fallback.id());
            let latest = match head {
                Ok(Some(head)) => head,
                Ok(None) => fallback,
                Err(err) => {
                    warn!(request_id = fallback.id(), error = %err, "ledger unreadable, saving local copy");
                    fallback
                }
            };
            if let Err(err) = mirror.repository.save(&latest).await {
                warn!(request_id = latest.id(), error = %err, "request write failed");
            }
        });
    }

    fn mirror_offer(&self, offer: Offer) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        spawn_best_effort("record offer", async move {
            if let Err(err) = mirror.repository.record_offer(&offer).await {
                warn!(offer_id = %offer.id, error = %err, "offer write failed");
            }
        });
    }

    #[cfg(feature = "emitter")]
    fn emit(&self, event: &str, request: &Request) {
        let Some(emitter) = &self.emitter else {
            return;
        };
        let snapshot = match serde_json::to_string(&request.to_record()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(event, error = %err, "could not encode request snapshot");
                return;
            }
        };
        match emitter.lock() {
            Ok(mut emitter) => {
                emitter.emit(event, snapshot);
            }
            Err(_) => warn!(event, "emitter lock poisoned, listeners skipped"),
        }
    }

    #[cfg(not(feature = "emitter"))]
    fn emit(&self, _event: &str, _request: &Request) {}
}
