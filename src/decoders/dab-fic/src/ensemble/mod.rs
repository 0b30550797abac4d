// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Ensemble configuration: services, sub-channels, components and
//! announcement clusters, plus the read-side queries used for service
//! selection.

mod decoder;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::protection::Protection;

pub use decoder::{EnsembleDecoder, EnsembleEvent};

/// Audio service component type of DAB+ (HE-AAC v2).
pub const ASCTY_DAB_PLUS: u8 = 63;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Service {
    pub sid: u32,
    pub label: Option<String>,
    pub short_label: Option<String>,
    pub data_service: bool,
    pub ca_id: u8,
    /// International programme type code.
    pub pty: Option<u8>,
    pub language: Option<u8>,
    /// FM frequencies carrying the same programme, in kHz.
    pub fm_frequencies_khz: Vec<u32>,
    pub announcement_support: u16,
    pub clusters: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubChannel {
    pub id: u8,
    /// First capacity unit within the CIF.
    pub start_addr: u16,
    /// Length in capacity units.
    pub size: u16,
    pub protection: Protection,
    /// Bit rate in kbit/s.
    pub bitrate: u16,
    pub fec_scheme: Option<u8>,
    pub language: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Transport {
    StreamAudio { ascty: u8, sub_channel: u8 },
    StreamData { dscty: u8, sub_channel: u8 },
    Packet { scid: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PacketInfo {
    pub scid: u16,
    pub sub_channel: u8,
    pub dscty: u8,
    pub packet_address: u16,
    pub data_groups: bool,
    pub language: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceComponent {
    pub sid: u32,
    /// Position in the service's component list.
    pub index: u8,
    /// Service component identifier within the service, if known.
    pub scids: Option<u8>,
    pub primary: bool,
    pub access_control: bool,
    pub transport: Transport,
    pub user_apps: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cluster {
    pub id: u8,
    pub services: Vec<u32>,
    pub switch_flags: u16,
    pub sub_channel: Option<u8>,
    pub new: bool,
    pub region: Option<u8>,
}

/// One generation of the ensemble configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnsembleConfig {
    pub eid: Option<u16>,
    pub label: Option<String>,
    pub short_label: Option<String>,
    pub ecc: Option<u8>,
    /// Local time offset in half hours.
    pub lto: Option<i8>,
    pub international_table: Option<u8>,
    pub date_time: Option<NaiveDateTime>,
    pub cif_count: u16,
    pub alarm: bool,
    /// Service count announced by FIG 0/7, when broadcast.
    pub expected_services: Option<u8>,
    pub services: BTreeMap<u32, Service>,
    pub sub_channels: BTreeMap<u8, SubChannel>,
    pub packets: BTreeMap<u16, PacketInfo>,
    pub components: Vec<ServiceComponent>,
    pub clusters: BTreeMap<u8, Cluster>,
    /// Frequencies of other ensembles by EId, in kHz.
    pub other_ensembles: BTreeMap<u16, Vec<u32>>,
    #[serde(skip)]
    pub(crate) component_labels: BTreeMap<(u32, u8), String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOrder {
    ById,
    ByName,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDescriptor {
    pub sid: u32,
    pub component: u8,
    pub sub_channel: u8,
    pub start_addr: u16,
    pub length: u16,
    pub protection: Protection,
    pub bitrate: u16,
    pub dab_plus: bool,
    pub language: Option<u8>,
    pub pty: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketDescriptor {
    pub sid: u32,
    pub component: u8,
    pub sub_channel: u8,
    pub start_addr: u16,
    pub length: u16,
    pub protection: Protection,
    pub bitrate: u16,
    pub dscty: u8,
    pub packet_address: u16,
    pub data_groups: bool,
    pub fec_scheme: Option<u8>,
    pub app_types: Vec<u16>,
}

/// Service-selection matching on labels: case and padding insensitive.
pub fn label_matches(label: &str, name: &str) -> bool {
    label.trim().to_lowercase() == name.trim().to_lowercase()
}

impl EnsembleConfig {
    /// Sub-channel a component's payload travels in.
    pub fn component_sub_channel(&self, component: &ServiceComponent) -> Option<&SubChannel> {
        let id = match component.transport {
            Transport::StreamAudio { sub_channel, .. } | Transport::StreamData { sub_channel, .. } => {
                sub_channel
            }
            Transport::Packet { scid } => self.packets.get(&scid)?.sub_channel,
        };
        self.sub_channels.get(&id)
    }

    /// A component is public once its service and sub-channel are known and,
    /// for data, its component type is known and non-zero.
    pub fn is_visible(&self, component: &ServiceComponent) -> bool {
        if !self.services.contains_key(&component.sid) || self.component_sub_channel(component).is_none() {
            return false;
        }
        match component.transport {
            Transport::StreamAudio { .. } => true,
            Transport::StreamData { dscty, .. } => dscty != 0,
            Transport::Packet { scid } => self.packets.get(&scid).is_some_and(|p| p.dscty != 0),
        }
    }

    pub fn visible_components(&self) -> impl Iterator<Item = &ServiceComponent> {
        self.components.iter().filter(|c| self.is_visible(c))
    }

    pub fn component(&self, sid: u32, index: u8) -> Option<&ServiceComponent> {
        self.visible_components()
            .find(|c| c.sid == sid && c.index == index)
    }

    pub fn component_label(&self, component: &ServiceComponent) -> Option<&str> {
        let scids = component.scids?;
        self.component_labels
            .get(&(component.sid, scids))
            .map(String::as_str)
    }

    fn service_by_name(&self, name: &str) -> Option<&Service> {
        self.services
            .values()
            .find(|s| s.label.as_deref().is_some_and(|l| label_matches(l, name)))
    }

    pub fn ensemble_id(&self) -> Option<u16> {
        self.eid
    }

    pub fn ensemble_name(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Label of service `sid` if it has a public component `component`.
    pub fn find_service(&self, sid: u32, component: u8) -> Option<&str> {
        self.component(sid, component)?;
        self.services.get(&sid)?.label.as_deref()
    }

    /// Labelled services with at least one public component.
    pub fn get_services(&self, order: ServiceOrder) -> Vec<u32> {
        let mut services: Vec<&Service> = self
            .services
            .values()
            .filter(|s| s.label.is_some())
            .filter(|s| self.visible_components().any(|c| c.sid == s.sid))
            .collect();
        if order == ServiceOrder::ByName {
            services.sort_by_key(|s| s.label.as_deref().unwrap_or_default().to_lowercase());
        }
        services.into_iter().map(|s| s.sid).collect()
    }

    /// Primary audio component of the service labelled `name`.
    pub fn data_for_audio_service(&self, name: &str) -> Option<AudioDescriptor> {
        let service = self.service_by_name(name)?;
        let component = self
            .visible_components()
            .filter(|c| c.sid == service.sid)
            .filter(|c| matches!(c.transport, Transport::StreamAudio { .. }))
            .min_by_key(|c| (!c.primary, c.index))?;
        let Transport::StreamAudio { ascty, .. } = component.transport else {
            return None;
        };
        let sc = self.component_sub_channel(component)?;
        Some(AudioDescriptor {
            sid: service.sid,
            component: component.index,
            sub_channel: sc.id,
            start_addr: sc.start_addr,
            length: sc.size,
            protection: sc.protection,
            bitrate: sc.bitrate,
            dab_plus: ascty == ASCTY_DAB_PLUS,
            language: sc.language.or(service.language),
            pty: service.pty,
        })
    }

    /// Packet-mode component `component` of the service labelled `name`.
    pub fn data_for_packet_service(&self, name: &str, component: u8) -> Option<PacketDescriptor> {
        let service = self.service_by_name(name)?;
        let comp = self.component(service.sid, component)?;
        let Transport::Packet { scid } = comp.transport else {
            return None;
        };
        let packet = self.packets.get(&scid)?;
        let sc = self.sub_channels.get(&packet.sub_channel)?;
        Some(PacketDescriptor {
            sid: service.sid,
            component: comp.index,
            sub_channel: sc.id,
            start_addr: sc.start_addr,
            length: sc.size,
            protection: sc.protection,
            bitrate: sc.bitrate,
            dscty: packet.dscty,
            packet_address: packet.packet_address,
            data_groups: packet.data_groups,
            fec_scheme: sc.fec_scheme,
            app_types: comp.user_apps.clone(),
        })
    }

    pub fn get_sub_channel_id(&self, name: &str, component: u8) -> Option<u8> {
        let service = self.service_by_name(name)?;
        let comp = self.component(service.sid, component)?;
        self.component_sub_channel(comp).map(|sc| sc.id)
    }

    /// Compact view of the public part of the configuration.
    pub fn summary(&self) -> EnsembleSummary {
        let services = self
            .services
            .values()
            .map(|s| ServiceSummary {
                sid: format!("{:04X}", s.sid),
                label: s.label.clone(),
                pty: s.pty,
                components: self
                    .visible_components()
                    .filter(|c| c.sid == s.sid)
                    .filter_map(|c| {
                        let sc = self.component_sub_channel(c)?;
                        Some(ComponentSummary {
                            index: c.index,
                            label: self.component_label(c).map(str::to_string),
                            kind: match c.transport {
                                Transport::StreamAudio { ascty, .. } if ascty == ASCTY_DAB_PLUS => "DAB+",
                                Transport::StreamAudio { .. } => "DAB",
                                Transport::StreamData { .. } => "stream data",
                                Transport::Packet { .. } => "packet data",
                            },
                            sub_channel: sc.id,
                            start_addr: sc.start_addr,
                            size: sc.size,
                            bitrate: sc.bitrate,
                            protection: sc.protection.label(),
                        })
                    })
                    .collect(),
            })
            .filter(|s| !s.components.is_empty())
            .collect();
        EnsembleSummary {
            eid: self.eid.map(|e| format!("{:04X}", e)),
            label: self.label.clone(),
            ecc: self.ecc,
            date_time: self.date_time,
            services,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleSummary {
    pub eid: Option<String>,
    pub label: Option<String>,
    pub ecc: Option<u8>,
    pub date_time: Option<NaiveDateTime>,
    pub services: Vec<ServiceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub sid: String,
    pub label: Option<String>,
    pub pty: Option<u8>,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub index: u8,
    pub label: Option<String>,
    pub kind: &'static str,
    pub sub_channel: u8,
    pub start_addr: u16,
    pub size: u16,
    pub bitrate: u16,
    pub protection: String,
}

/// Published configuration shared with readers on other threads. The lock
/// only guards the pointer; a snapshot is immutable.
#[derive(Debug, Clone, Default)]
pub struct SharedEnsemble {
    inner: Arc<Mutex<Arc<EnsembleConfig>>>,
}

impl SharedEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<EnsembleConfig> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn publish(&self, config: EnsembleConfig) {
        let config = Arc::new(config);
        match self.inner.lock() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}
