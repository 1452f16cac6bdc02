//! BLE central transport (Nordic UART profile).
//!
//! Implements [`TransportAdapter`] by scanning for the adapter, opening a
//! GATT client connection, and wiring the UART characteristics:
//!
//! | Role | UUID                                   | Property         |
//! |------|----------------------------------------|------------------|
//! | svc  | `6E400001-B5A3-F393-E0A9-E50E24DCCA9E` |                  |
//! | TX   | `6E400002-B5A3-F393-E0A9-E50E24DCCA9E` | Write (no rsp)   |
//! | RX   | `6E400003-B5A3-F393-E0A9-E50E24DCCA9E` | Notify           |
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GAP scanner + GATT client.
//! - **all other targets**: an inert stub; host tests use the simulator.
//!
//! ## Callback routing
//!
//! Bluedroid callbacks are C function pointers without a user-data slot.
//! [`BleCentral::new`] installs the engine's [`LinkEvents`] handle once, and
//! the callbacks only ever post to it: scan hits, notification bytes, and
//! link loss. Connection progress is tracked in atomics so
//! [`TransportAdapter::connect`] can wait for each GATT step.

use log::info;

use super::utils::advertised_name_matches;
use crate::app::ports::TransportAdapter;
use crate::error::TransportError;
use crate::events::LinkEvents;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const UART_SERVICE_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;
pub const UART_TX_CHAR_UUID: u128 = 0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E;
pub const UART_RX_CHAR_UUID: u128 = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E;

/// Client Characteristic Configuration descriptor.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const CCCD_UUID: u16 = 0x2902;

/// Upper bound for each GATT step during `connect`.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const GATT_STEP_TIMEOUT_MS: u32 = 5_000;

// ───────────────────────────────────────────────────────────────
// Advertisement matching (pure)
// ───────────────────────────────────────────────────────────────

/// Whether a 128-bit service UUID list (little-endian, as advertised)
/// contains `uuid`.
pub fn advertises_service(uuid_list: &[u8], uuid: u128) -> bool {
    let wanted = uuid.to_le_bytes();
    uuid_list.chunks_exact(16).any(|u| u == wanted)
}

/// An advertisement matches when it lists the UART service UUID or its
/// complete name equals the target.
pub fn advertisement_matches(name: Option<&[u8]>, service_uuids: Option<&[u8]>, target: &str) -> bool {
    service_uuids.is_some_and(|list| advertises_service(list, UART_SERVICE_UUID))
        || name.is_some_and(|name| advertised_name_matches(name, target))
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF static state (bridges Bluedroid callbacks)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
use std::sync::{Mutex, OnceLock};

#[cfg(target_os = "espidf")]
static LINK: OnceLock<LinkEvents> = OnceLock::new();

#[cfg(target_os = "espidf")]
static GATTC_IF: AtomicU32 = AtomicU32::new(u32::MAX);
#[cfg(target_os = "espidf")]
static CONN_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static CONNECTED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static SCAN_SECS: AtomicU32 = AtomicU32::new(10);
#[cfg(target_os = "espidf")]
static SVC_START: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static SVC_END: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static STEP: AtomicU8 = AtomicU8::new(STEP_IDLE);

#[cfg(target_os = "espidf")]
const STEP_IDLE: u8 = 0;
#[cfg(target_os = "espidf")]
const STEP_OPEN: u8 = 1;
#[cfg(target_os = "espidf")]
const STEP_SEARCH_DONE: u8 = 2;
#[cfg(target_os = "espidf")]
const STEP_NOTIFY_READY: u8 = 3;
#[cfg(target_os = "espidf")]
const STEP_FAILED: u8 = 0xFF;

/// Target name and the peer found by the last scan.
#[cfg(target_os = "espidf")]
struct ScanTarget {
    name: heapless::String<{ crate::config::MAX_TARGET_LEN }>,
    peer: Option<([u8; 6], esp_idf_svc::sys::esp_ble_addr_type_t)>,
}

#[cfg(target_os = "espidf")]
static SCAN_TARGET: Mutex<ScanTarget> = Mutex::new(ScanTarget {
    name: heapless::String::new(),
    peer: None,
});

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

/// Slice of one AD structure of `ad_type` inside raw advertising data.
#[cfg(target_os = "espidf")]
unsafe fn adv_field(adv: &mut [u8], ad_type: u32) -> Option<&[u8]> {
    let mut len: u8 = 0;
    let ptr = unsafe {
        esp_idf_svc::sys::esp_ble_resolve_adv_data(adv.as_mut_ptr(), ad_type as u8, &mut len)
    };
    if ptr.is_null() || len == 0 {
        return None;
    }
    Some(unsafe { core::slice::from_raw_parts(ptr, len as usize) })
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
            unsafe { esp_ble_gap_start_scanning(SCAN_SECS.load(AtomicOrdering::Relaxed)) };
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
            log::debug!("LINK: scan started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            let r = unsafe { &mut (*param).scan_rst };
            if r.search_evt != esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT {
                return;
            }
            let total = (r.adv_data_len as usize + r.scan_rsp_len as usize).min(r.ble_adv.len());
            let adv = &mut r.ble_adv[..total];
            let name = unsafe { adv_field(adv, esp_ble_adv_data_type_ESP_BLE_AD_TYPE_NAME_CMPL) }
                .map(<[u8]>::to_vec);
            let uuids = unsafe { adv_field(adv, esp_ble_adv_data_type_ESP_BLE_AD_TYPE_128SRV_CMPL) }
                .map(<[u8]>::to_vec);

            let Ok(mut target) = SCAN_TARGET.lock() else {
                return;
            };
            if target.peer.is_some()
                || !advertisement_matches(name.as_deref(), uuids.as_deref(), &target.name)
            {
                return;
            }
            target.peer = Some((r.bda, r.ble_addr_type));
            drop(target);

            log::info!("LINK: found {:02X?}", r.bda);
            unsafe { esp_ble_gap_stop_scanning() };
            if let Some(link) = LINK.get() {
                link.target_found();
            }
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gattc_event_handler(
    event: esp_idf_svc::sys::esp_gattc_cb_event_t,
    gattc_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gattc_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => {
            GATTC_IF.store(gattc_if as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTC: app registered (if={})", gattc_if);
        }
        esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => {
            let p = unsafe { &(*param).open };
            if p.status == esp_gatt_status_t_ESP_GATT_OK {
                CONN_ID.store(p.conn_id as u32, AtomicOrdering::Relaxed);
                CONNECTED.store(true, AtomicOrdering::Release);
                STEP.store(STEP_OPEN, AtomicOrdering::Release);
            } else {
                log::warn!("BLE GATTC: open failed (status={})", p.status);
                STEP.store(STEP_FAILED, AtomicOrdering::Release);
            }
        }
        esp_gattc_cb_event_t_ESP_GATTC_SEARCH_RES_EVT => {
            let p = unsafe { &(*param).search_res };
            if p.srvc_id.uuid.len == 16
                && unsafe { p.srvc_id.uuid.uuid.uuid128 } == UART_SERVICE_UUID.to_le_bytes()
            {
                SVC_START.store(p.start_handle as u32, AtomicOrdering::Relaxed);
                SVC_END.store(p.end_handle as u32, AtomicOrdering::Relaxed);
            }
        }
        esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => {
            STEP.store(STEP_SEARCH_DONE, AtomicOrdering::Release);
        }
        esp_gattc_cb_event_t_ESP_GATTC_REG_FOR_NOTIFY_EVT => {
            let p = unsafe { &(*param).reg_for_notify };
            let step = if p.status == esp_gatt_status_t_ESP_GATT_OK {
                STEP_NOTIFY_READY
            } else {
                STEP_FAILED
            };
            STEP.store(step, AtomicOrdering::Release);
        }
        esp_gattc_cb_event_t_ESP_GATTC_NOTIFY_EVT => {
            let p = unsafe { &(*param).notify };
            let data = unsafe { core::slice::from_raw_parts(p.value, p.value_len as usize) };
            if let Some(link) = LINK.get() {
                link.bytes_received(data);
            }
        }
        esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => {
            let was_connected = CONNECTED.swap(false, AtomicOrdering::AcqRel);
            STEP.store(STEP_FAILED, AtomicOrdering::Release);
            log::info!("BLE GATTC: disconnected");
            if was_connected {
                if let Some(link) = LINK.get() {
                    link.disconnected();
                }
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct BleCentral {
    #[cfg(target_os = "espidf")]
    tx_handle: u16,
    #[cfg(target_os = "espidf")]
    stack_ready: bool,
    #[cfg(not(target_os = "espidf"))]
    _events: LinkEvents,
}

impl BleCentral {
    /// Bring up the controller and Bluedroid, register the callbacks, and
    /// route them to `events`.
    #[cfg(target_os = "espidf")]
    pub fn new(events: LinkEvents) -> Self {
        use esp_idf_svc::sys::*;

        if LINK.set(events).is_err() {
            log::warn!("BLE: link events already installed, keeping the first handle");
        }

        let mut adapter = Self {
            tx_handle: 0,
            stack_ready: false,
        };

        unsafe {
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                log::error!("BLE: bt_controller_init failed ({})", ret);
                return adapter;
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                log::error!("BLE: bt_controller_enable failed ({})", ret);
                return adapter;
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                log::error!("BLE: bluedroid_init failed ({})", ret);
                return adapter;
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                log::error!("BLE: bluedroid_enable failed ({})", ret);
                return adapter;
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gattc_register_callback(Some(ble_gattc_event_handler));
            esp_ble_gattc_app_register(0);
        }

        adapter.stack_ready = true;
        info!("BLE(espidf): Bluedroid central ready");
        adapter
    }

    /// Host builds have no radio; every link operation reports
    /// [`TransportError::StackUnavailable`].
    #[cfg(not(target_os = "espidf"))]
    pub fn new(events: LinkEvents) -> Self {
        info!("BLE(sim): no radio on this target");
        Self { _events: events }
    }

    /// Spin until `STEP` reaches `want`, fails, or the step times out.
    #[cfg(target_os = "espidf")]
    fn wait_for_step(want: u8) -> bool {
        let mut waited = 0;
        while waited < GATT_STEP_TIMEOUT_MS {
            match STEP.load(AtomicOrdering::Acquire) {
                s if s == want => return true,
                STEP_FAILED => return false,
                _ => {}
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
            waited += 10;
        }
        false
    }

    #[cfg(target_os = "espidf")]
    fn gattc_if() -> u8 {
        GATTC_IF.load(AtomicOrdering::Relaxed) as u8
    }

    #[cfg(target_os = "espidf")]
    fn conn_id() -> u16 {
        CONN_ID.load(AtomicOrdering::Relaxed) as u16
    }

    /// Resolve the UART characteristics and subscribe to RX.
    #[cfg(target_os = "espidf")]
    fn setup_gatt(&mut self, peer: &mut [u8; 6]) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;

        SVC_START.store(0, AtomicOrdering::Relaxed);
        SVC_END.store(0, AtomicOrdering::Relaxed);
        let mut svc_uuid = uuid128_to_esp(UART_SERVICE_UUID);
        unsafe { esp_ble_gattc_search_service(Self::gattc_if(), Self::conn_id(), &mut svc_uuid) };
        if !Self::wait_for_step(STEP_SEARCH_DONE) {
            return Err(TransportError::ServiceNotFound);
        }
        let start = SVC_START.load(AtomicOrdering::Relaxed) as u16;
        let end = SVC_END.load(AtomicOrdering::Relaxed) as u16;
        if start == 0 {
            return Err(TransportError::ServiceNotFound);
        }

        let find = |uuid: u128| -> Option<esp_gattc_char_elem_t> {
            let mut elem: esp_gattc_char_elem_t = unsafe { core::mem::zeroed() };
            let mut count: u16 = 1;
            let status = unsafe {
                esp_ble_gattc_get_char_by_uuid(
                    Self::gattc_if(),
                    Self::conn_id(),
                    start,
                    end,
                    uuid128_to_esp(uuid),
                    &mut elem,
                    &mut count,
                )
            };
            (status == esp_gatt_status_t_ESP_GATT_OK && count > 0).then_some(elem)
        };

        let tx = find(UART_TX_CHAR_UUID).ok_or(TransportError::TxCharacteristicNotFound)?;
        let rx = find(UART_RX_CHAR_UUID).ok_or(TransportError::RxCharacteristicNotFound)?;
        if u32::from(rx.properties) & ESP_GATT_CHAR_PROP_BIT_NOTIFY == 0 {
            return Err(TransportError::NotifyUnsupported);
        }
        self.tx_handle = tx.char_handle;

        unsafe {
            esp_ble_gattc_register_for_notify(Self::gattc_if(), peer.as_mut_ptr(), rx.char_handle)
        };
        if !Self::wait_for_step(STEP_NOTIFY_READY) {
            return Err(TransportError::NotifyUnsupported);
        }

        // Enable notifications on the peer.
        let mut descr: esp_gattc_descr_elem_t = unsafe { core::mem::zeroed() };
        let mut count: u16 = 1;
        let status = unsafe {
            esp_ble_gattc_get_descr_by_char_handle(
                Self::gattc_if(),
                Self::conn_id(),
                rx.char_handle,
                uuid16_to_esp(CCCD_UUID),
                &mut descr,
                &mut count,
            )
        };
        if status == esp_gatt_status_t_ESP_GATT_OK && count > 0 {
            let mut enable = [0x01u8, 0x00];
            unsafe {
                esp_ble_gattc_write_char_descr(
                    Self::gattc_if(),
                    Self::conn_id(),
                    descr.handle,
                    enable.len() as u16,
                    enable.as_mut_ptr(),
                    esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_RSP,
                    esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
                )
            };
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// TransportAdapter implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl TransportAdapter for BleCentral {
    fn start_scan(&mut self, target: &str, window_ms: u64) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;
        if !self.stack_ready {
            return Err(TransportError::StackUnavailable);
        }
        {
            let mut t = SCAN_TARGET.lock().map_err(|_| TransportError::ScanFailed)?;
            t.name.clear();
            t.name.push_str(target).map_err(|()| TransportError::ScanFailed)?;
            t.peer = None;
        }
        SCAN_SECS.store((window_ms / 1000).max(1) as u32, AtomicOrdering::Relaxed);

        let mut params = esp_ble_scan_params_t {
            scan_type: esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
            scan_interval: 0x50,
            scan_window: 0x30,
            scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
        };
        // Scanning itself starts from the PARAM_SET_COMPLETE callback.
        let ret = unsafe { esp_ble_gap_set_scan_params(&mut params) };
        if ret != ESP_OK as i32 {
            log::warn!("BLE: set_scan_params failed ({})", ret);
            return Err(TransportError::ScanFailed);
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        unsafe { esp_idf_svc::sys::esp_ble_gap_stop_scanning() };
    }

    fn connect(&mut self, _target: &str) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;
        if !self.stack_ready {
            return Err(TransportError::StackUnavailable);
        }
        let (mut bda, addr_type) = SCAN_TARGET
            .lock()
            .ok()
            .and_then(|t| t.peer)
            .ok_or(TransportError::ConnectFailed)?;

        STEP.store(STEP_IDLE, AtomicOrdering::Release);
        unsafe { esp_ble_gattc_open(Self::gattc_if(), bda.as_mut_ptr(), addr_type, true) };
        if !Self::wait_for_step(STEP_OPEN) {
            return Err(TransportError::ConnectFailed);
        }

        if let Err(e) = self.setup_gatt(&mut bda) {
            self.disconnect();
            return Err(e);
        }
        info!("BLE: UART link ready (tx handle {})", self.tx_handle);
        Ok(())
    }

    fn disconnect(&mut self) {
        if CONNECTED.load(AtomicOrdering::Acquire) {
            unsafe { esp_idf_svc::sys::esp_ble_gattc_close(Self::gattc_if(), Self::conn_id()) };
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;
        if !CONNECTED.load(AtomicOrdering::Acquire) || self.tx_handle == 0 {
            return Err(TransportError::NotConnected);
        }
        let mut buf: heapless::Vec<u8, 32> = heapless::Vec::new();
        buf.extend_from_slice(bytes)
            .map_err(|_| TransportError::NotConnected)?;
        unsafe {
            esp_ble_gattc_write_char(
                Self::gattc_if(),
                Self::conn_id(),
                self.tx_handle,
                buf.len() as u16,
                buf.as_mut_ptr(),
                esp_gatt_write_type_t_ESP_GATT_WRITE_TYPE_NO_RSP,
                esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        };
        Ok(())
    }

    fn is_connected(&self) -> bool {
        CONNECTED.load(AtomicOrdering::Acquire)
    }
}

#[cfg(not(target_os = "espidf"))]
impl TransportAdapter for BleCentral {
    fn start_scan(&mut self, _target: &str, _window_ms: u64) -> Result<(), TransportError> {
        Err(TransportError::StackUnavailable)
    }

    fn stop_scan(&mut self) {}

    fn connect(&mut self, _target: &str) -> Result<(), TransportError> {
        Err(TransportError::StackUnavailable)
    }

    fn disconnect(&mut self) {}

    fn send(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_uuid_found_in_list() {
        let mut list = Vec::new();
        list.extend_from_slice(&0x1234_u128.to_le_bytes());
        list.extend_from_slice(&UART_SERVICE_UUID.to_le_bytes());
        assert!(advertises_service(&list, UART_SERVICE_UUID));
        assert!(!advertises_service(&list[..16], UART_SERVICE_UUID));
    }

    #[test]
    fn uuid_is_little_endian_on_air() {
        let bytes = UART_SERVICE_UUID.to_le_bytes();
        assert_eq!(bytes[0], 0x9E);
        assert_eq!(bytes[15], 0x6E);
    }

    #[test]
    fn uart_uuid_or_name_matches() {
        let uuids = UART_SERVICE_UUID.to_le_bytes();
        let other = 0x1234_u128.to_le_bytes();
        assert!(advertisement_matches(Some(b"OBDII"), None, "OBDII"));
        assert!(advertisement_matches(None, Some(&uuids), "OBDII"));
        assert!(advertisement_matches(Some(b"OBDII"), Some(&other), "OBDII"));
        assert!(!advertisement_matches(Some(b"Other"), Some(&other), "OBDII"));
        assert!(!advertisement_matches(None, None, "OBDII"));
    }

    #[test]
    fn uart_dongle_with_its_own_name_matches() {
        let uuids = UART_SERVICE_UUID.to_le_bytes();
        assert!(advertisement_matches(
            Some(b"VEEPEAK"),
            Some(&uuids),
            crate::config::DEFAULT_TARGET
        ));
    }

    #[test]
    fn host_stub_has_no_radio() {
        let mut ble = BleCentral::new(LinkEvents::new());
        assert_eq!(
            ble.start_scan("OBDII", 10_000),
            Err(TransportError::StackUnavailable)
        );
        assert_eq!(ble.connect("OBDII"), Err(TransportError::StackUnavailable));
        assert_eq!(ble.send(b"010C\r"), Err(TransportError::NotConnected));
        assert!(!ble.is_connected());
    }
}
