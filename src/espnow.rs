//! ESP-NOW radio and the Wi-Fi station it rides on.

use std::sync::Arc;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::{
    espnow::{EspNow, PeerInfo, SendStatus},
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    sys::{esp, esp_wifi_set_channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE, EspError},
    wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi, WifiDeviceId},
};

use crate::{
    config::format_mac,
    error::TransportError,
    link::{MacAddress, PeerRegistration, Radio, ReceiveHandler},
};

fn transport_error(e: EspError) -> TransportError {
    TransportError::from_code(e.code())
}

/// Starts Wi-Fi in station mode, unassociated, pinned to `channel`.
pub fn start_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    channel: u8,
) -> Result<BlockingWifi<EspWifi<'static>>, EspError> {
    let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

    let client_config = ClientConfiguration {
        channel: Some(channel),
        ..Default::default()
    };
    wifi.set_configuration(&Configuration::Client(client_config))?;
    wifi.start()?;

    esp!(unsafe { esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE) })?;

    let sta_mac = wifi.wifi().get_mac(WifiDeviceId::Sta)?;
    log::info!("sta mac: {} channel {}", format_mac(&sta_mac), channel);

    Ok(wifi)
}

/// `Radio` over the ESP-IDF ESP-NOW driver. Deinitializing drops the
/// driver, which unregisters its callbacks and peers.
#[derive(Default)]
pub struct EspNowRadio {
    espnow: Option<EspNow<'static>>,
}

impl EspNowRadio {
    pub fn new() -> Self {
        Self::default()
    }

    fn driver(&self) -> Result<&EspNow<'static>, TransportError> {
        self.espnow.as_ref().ok_or(TransportError::NotInitialized)
    }
}

impl Radio for EspNowRadio {
    fn init(&mut self, handler: Arc<dyn ReceiveHandler>) -> Result<(), TransportError> {
        self.espnow = None;

        let espnow = EspNow::take().map_err(|e| {
            log::error!("failed to get esp now: {}", e);
            transport_error(e)
        })?;

        espnow
            .register_recv_cb(move |mac: &[u8], data: &[u8]| handler.on_receive(mac, data))
            .map_err(transport_error)?;

        espnow
            .register_send_cb(|mac: &[u8], status: SendStatus| match status {
                SendStatus::SUCCESS => log::info!("delivered to {}", format_mac(mac)),
                SendStatus::FAIL => log::warn!("delivery to {} failed", format_mac(mac)),
            })
            .map_err(transport_error)?;

        log::info!("esp now initialized");
        self.espnow = Some(espnow);
        Ok(())
    }

    fn deinit(&mut self) {
        self.espnow = None;
    }

    fn peer_exists(&self, address: MacAddress) -> Result<bool, TransportError> {
        self.driver()?
            .peer_exists(address)
            .map_err(transport_error)
    }

    fn add_peer(&mut self, peer: &PeerRegistration) -> Result<(), TransportError> {
        let peer_info = PeerInfo {
            peer_addr: peer.address,
            channel: peer.channel,
            encrypt: false,
            ..Default::default()
        };

        self.driver()?.add_peer(peer_info).map_err(transport_error)?;
        log::info!("peer {} added", format_mac(&peer.address));
        Ok(())
    }

    fn send(&mut self, address: MacAddress, data: &[u8]) -> Result<(), TransportError> {
        self.driver()?
            .send(address, data)
            .map_err(transport_error)
    }
}
