// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Incremental, double-buffered ensemble configuration decoding.
//!
//! Records flagged as current configuration, labels and ensemble-wide
//! tables update the working `current` generation; records flagged as next
//! configuration accumulate in `next`. When FIG 0/0 signals that an
//! announced change took effect, `next` is overlaid onto `current` and
//! cleared. Readers only ever see published snapshots.

use crate::crc::FIB_BYTES;
use crate::fic::FibSink;
use crate::fig::{
    parse_fib, ComponentKind, ComponentRef, EnsembleInfo, Fig, FigRecord, FrequencyDef, LabelTarget,
    ServiceDef,
};

use super::{
    Cluster, EnsembleConfig, PacketInfo, Service, ServiceComponent, SharedEnsemble, SubChannel,
    Transport,
};

/// Sub-channel identifiers are 6 bits wide.
const MAX_SUB_CHANNELS: usize = 64;
/// Upper bound on service components held per generation.
const MAX_COMPONENTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsembleEvent {
    /// `next` became `current`.
    ConfigurationChanged,
    /// Every expected component of the current generation is public.
    EnsembleLoaded,
}

pub struct EnsembleDecoder {
    current: EnsembleConfig,
    next: EnsembleConfig,
    shared: SharedEnsemble,
    dirty: bool,
    last_change_flags: Option<u8>,
    loaded: bool,
    swaps: u64,
    events: Vec<EnsembleEvent>,
}

impl Default for EnsembleDecoder {
    fn default() -> Self {
        Self::new(SharedEnsemble::new())
    }
}

impl FibSink for EnsembleDecoder {
    fn process_fib(&mut self, fib: &[u8; FIB_BYTES]) {
        for record in parse_fib(fib) {
            self.apply(record);
        }
        self.check_loaded();
    }
}

impl EnsembleDecoder {
    pub fn new(shared: SharedEnsemble) -> Self {
        Self {
            current: EnsembleConfig::default(),
            next: EnsembleConfig::default(),
            shared,
            dirty: false,
            last_change_flags: None,
            loaded: false,
            swaps: 0,
            events: Vec::new(),
        }
    }

    pub fn shared(&self) -> SharedEnsemble {
        self.shared.clone()
    }

    pub fn current(&self) -> &EnsembleConfig {
        &self.current
    }

    pub fn next(&self) -> &EnsembleConfig {
        &self.next
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Forget everything, as on a retune.
    pub fn reset(&mut self) {
        self.current = EnsembleConfig::default();
        self.next = EnsembleConfig::default();
        self.last_change_flags = None;
        self.loaded = false;
        self.events.clear();
        self.dirty = false;
        self.shared.publish(EnsembleConfig::default());
    }

    /// Publish the working `current` generation if it changed. Returns true
    /// when a new snapshot was published.
    pub fn publish(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.shared.publish(self.current.clone());
        self.dirty = false;
        true
    }

    pub fn take_events(&mut self) -> Vec<EnsembleEvent> {
        std::mem::take(&mut self.events)
    }

    fn apply(&mut self, record: FigRecord) {
        if record.other_ensemble {
            return;
        }
        let FigRecord { next, fig, .. } = record;
        match fig {
            Fig::EnsembleInfo(info) => self.ensemble_info(info),
            Fig::Label(label) => {
                let cfg = &mut self.current;
                match label.target {
                    LabelTarget::Ensemble(eid) => {
                        if cfg.eid.is_none() || cfg.eid == Some(eid) {
                            cfg.label = Some(label.label);
                            cfg.short_label = Some(label.short);
                        }
                    }
                    LabelTarget::Service(sid) => {
                        if let Some(service) = cfg.services.get_mut(&sid) {
                            service.label = Some(label.label);
                            service.short_label = Some(label.short);
                        }
                    }
                    LabelTarget::Component { sid, scids } => {
                        cfg.component_labels.insert((sid, scids), label.label);
                    }
                }
                self.dirty = true;
            }
            Fig::Country(info) => {
                self.current.ecc = Some(info.ecc);
                self.current.lto = Some(info.lto);
                self.current.international_table = Some(info.table_id);
                self.dirty = true;
            }
            Fig::DateTime { utc, .. } => {
                self.current.date_time = Some(utc);
                self.dirty = true;
            }
            Fig::ConfigurationInfo { services, .. } => {
                self.current.expected_services = Some(services);
                self.dirty = true;
            }
            other => {
                let target = if next { &mut self.next } else { &mut self.current };
                apply_table(target, other);
                if !next {
                    self.dirty = true;
                }
            }
        }
    }

    fn ensemble_info(&mut self, info: EnsembleInfo) {
        if self.current.eid.is_some_and(|eid| eid != info.eid) {
            tracing::warn!(
                "ensemble id changed from {:04X} to {:04X}",
                self.current.eid.unwrap_or_default(),
                info.eid
            );
        }
        self.current.eid = Some(info.eid);
        self.current.cif_count = info.cif_count;
        self.current.alarm = info.alarm;

        let previous = self.last_change_flags.replace(info.change_flags);
        if info.change_flags == 0 && previous == Some(3) {
            self.commit();
        } else if info.change_flags != 0 && previous == Some(0) {
            tracing::debug!(
                "reconfiguration announced (flags {}, occurrence {:?})",
                info.change_flags,
                info.occurrence_change
            );
        }
        self.dirty = true;
    }

    /// Overlay `next` onto `current`: entries redefined in `next` replace
    /// their counterparts, everything else survives.
    fn commit(&mut self) {
        let next = std::mem::take(&mut self.next);
        let cfg = &mut self.current;

        for (id, sc) in next.sub_channels {
            cfg.sub_channels.insert(id, sc);
        }
        for (scid, packet) in next.packets {
            cfg.packets.insert(scid, packet);
        }
        for (sid, service) in next.services {
            let entry = cfg.services.entry(sid).or_insert_with(|| Service {
                sid,
                ..Default::default()
            });
            entry.data_service = service.data_service;
            entry.ca_id = service.ca_id;
        }
        for component in next.components {
            upsert_component(cfg, component);
        }
        for (id, cluster) in next.clusters {
            cfg.clusters.insert(id, cluster);
        }

        self.swaps += 1;
        self.loaded = false;
        self.dirty = true;
        self.events.push(EnsembleEvent::ConfigurationChanged);
        tracing::info!("ensemble reconfiguration committed (generation {})", self.swaps);
    }

    fn check_loaded(&mut self) {
        if self.loaded {
            return;
        }
        let cfg = &self.current;
        let public = cfg.visible_components().count();
        if public == 0 {
            return;
        }
        let target = match cfg.expected_services {
            Some(expected) => usize::from(expected),
            None => cfg.services.len(),
        };
        if public >= target {
            self.loaded = true;
            self.events.push(EnsembleEvent::EnsembleLoaded);
            tracing::info!(
                "ensemble loaded: {} components, {} services",
                public,
                cfg.services.len()
            );
        }
    }
}

fn upsert_component(cfg: &mut EnsembleConfig, component: ServiceComponent) {
    if let Some(existing) = cfg
        .components
        .iter_mut()
        .find(|c| c.sid == component.sid && c.index == component.index)
    {
        let user_apps = std::mem::take(&mut existing.user_apps);
        let scids = existing.scids;
        *existing = component;
        if existing.user_apps.is_empty() {
            existing.user_apps = user_apps;
        }
        existing.scids = existing.scids.or(scids);
    } else if cfg.components.len() < MAX_COMPONENTS {
        cfg.components.push(component);
    } else {
        tracing::warn!("component table full, {:X}/{} ignored", component.sid, component.index);
    }
}

/// Apply one structural table to a generation.
fn apply_table(cfg: &mut EnsembleConfig, fig: Fig) {
    match fig {
        Fig::SubChannels(list) => {
            for def in list {
                let Some((protection, size, bitrate)) = def.resolve() else {
                    tracing::trace!("sub-channel {} with unknown protection ignored", def.id);
                    continue;
                };
                if usize::from(def.start_addr) + usize::from(size) > dab_core::mode::CUS_PER_CIF {
                    continue;
                }
                let previous = cfg.sub_channels.get(&def.id).copied();
                if previous.is_none() && cfg.sub_channels.len() >= MAX_SUB_CHANNELS {
                    continue;
                }
                cfg.sub_channels.insert(
                    def.id,
                    SubChannel {
                        id: def.id,
                        start_addr: def.start_addr,
                        size,
                        protection,
                        bitrate,
                        fec_scheme: previous.and_then(|p| p.fec_scheme),
                        language: previous.and_then(|p| p.language),
                    },
                );
            }
        }
        Fig::Services(list) => {
            for def in list {
                add_service(cfg, def);
            }
        }
        Fig::PacketComponents(list) => {
            for def in list {
                let language = cfg.packets.get(&def.scid).and_then(|p| p.language);
                cfg.packets.insert(
                    def.scid,
                    PacketInfo {
                        scid: def.scid,
                        sub_channel: def.sub_channel,
                        dscty: def.dscty,
                        packet_address: def.packet_address,
                        data_groups: def.data_groups,
                        language,
                    },
                );
            }
        }
        Fig::Languages(list) => {
            for def in list {
                match def.target {
                    ComponentRef::SubChannel(id) => {
                        if let Some(sc) = cfg.sub_channels.get_mut(&id) {
                            sc.language = Some(def.language);
                        }
                    }
                    ComponentRef::Scid(scid) => {
                        if let Some(p) = cfg.packets.get_mut(&scid) {
                            p.language = Some(def.language);
                        }
                    }
                }
            }
        }
        Fig::GlobalDefinitions(list) => {
            for def in list {
                let matches = |c: &ServiceComponent| match (def.target, c.transport) {
                    (ComponentRef::SubChannel(id), Transport::StreamAudio { sub_channel, .. })
                    | (ComponentRef::SubChannel(id), Transport::StreamData { sub_channel, .. }) => {
                        id == sub_channel
                    }
                    (ComponentRef::Scid(id), Transport::Packet { scid }) => id == scid,
                    _ => false,
                };
                if let Some(c) = cfg
                    .components
                    .iter_mut()
                    .find(|c| c.sid == def.sid && matches(c))
                {
                    c.scids = Some(def.scids);
                }
            }
        }
        Fig::UserApplications(list) => {
            for def in list {
                if let Some(c) = cfg
                    .components
                    .iter_mut()
                    .find(|c| c.sid == def.sid && c.scids == Some(def.scids))
                {
                    c.user_apps = def.apps.iter().map(|a| a.app_type).collect();
                }
            }
        }
        Fig::FecSchemes(list) => {
            for (id, scheme) in list {
                if let Some(sc) = cfg.sub_channels.get_mut(&id) {
                    sc.fec_scheme = Some(scheme);
                }
            }
        }
        Fig::ProgrammeTypes(list) => {
            for def in list {
                if let Some(s) = cfg.services.get_mut(&u32::from(def.sid)) {
                    s.pty = Some(def.international_code);
                    s.language = def.language.or(s.language);
                }
            }
        }
        Fig::AnnouncementSupport(list) => {
            for def in list {
                let sid = u32::from(def.sid);
                if let Some(s) = cfg.services.get_mut(&sid) {
                    s.announcement_support = def.support_flags;
                    s.clusters = def.clusters.clone();
                }
                for id in def.clusters {
                    let cluster = cfg.clusters.entry(id).or_insert_with(|| Cluster {
                        id,
                        ..Default::default()
                    });
                    if !cluster.services.contains(&sid) {
                        cluster.services.push(sid);
                    }
                }
            }
        }
        Fig::AnnouncementSwitching(list) => {
            for def in list {
                let cluster = cfg.clusters.entry(def.cluster).or_insert_with(|| Cluster {
                    id: def.cluster,
                    ..Default::default()
                });
                cluster.switch_flags = def.switch_flags;
                cluster.sub_channel = Some(def.sub_channel);
                cluster.new = def.new;
                cluster.region = def.region;
            }
        }
        Fig::FrequencyInfo(list) => {
            for def in list {
                let target = match def.range_modulation {
                    FrequencyDef::RM_FM_RDS | FrequencyDef::RM_FM => cfg
                        .services
                        .get_mut(&u32::from(def.id))
                        .map(|s| &mut s.fm_frequencies_khz),
                    FrequencyDef::RM_DAB => Some(cfg.other_ensembles.entry(def.id).or_default()),
                    _ => None,
                };
                if let Some(freqs) = target {
                    for f in def.frequencies_khz {
                        if !freqs.contains(&f) {
                            freqs.push(f);
                        }
                    }
                    freqs.sort_unstable();
                }
            }
        }
        _ => {}
    }
}

fn add_service(cfg: &mut EnsembleConfig, def: ServiceDef) {
    let service = cfg.services.entry(def.sid).or_insert_with(|| Service {
        sid: def.sid,
        ..Default::default()
    });
    service.data_service = def.data_service;
    service.ca_id = def.ca_id;

    for (index, comp) in def.components.iter().enumerate() {
        let transport = match comp.kind {
            ComponentKind::Audio { ascty, sub_channel } => Transport::StreamAudio { ascty, sub_channel },
            ComponentKind::StreamData { dscty, sub_channel } => {
                Transport::StreamData { dscty, sub_channel }
            }
            ComponentKind::Packet { scid } => Transport::Packet { scid },
        };
        upsert_component(
            cfg,
            ServiceComponent {
                sid: def.sid,
                index: index as u8,
                scids: comp.primary.then_some(0),
                primary: comp.primary,
                access_control: comp.access_control,
                transport,
                user_apps: Vec::new(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{audio_service, ensemble_info, fib, fig0, service_label, sub_channel};
    use crate::ensemble::ServiceOrder;

    fn feed(dec: &mut EnsembleDecoder, figs: &[&[u8]]) {
        let fib = fib(figs).unwrap();
        dec.process_fib(&fib);
    }

    fn loaded_decoder() -> EnsembleDecoder {
        let mut dec = EnsembleDecoder::default();
        feed(&mut dec, &[&ensemble_info(0x10ab, 0), &sub_channel(1, 0, false), &sub_channel(2, 42, false)]);
        feed(&mut dec, &[&audio_service(0xd210, 1, false), &service_label(0xd210, "One")]);
        feed(&mut dec, &[&audio_service(0xd220, 2, false), &service_label(0xd220, "Two")]);
        dec
    }

    #[test]
    fn builds_current_configuration() {
        let mut dec = loaded_decoder();
        let cfg = dec.current();
        assert_eq!(cfg.eid, Some(0x10ab));
        assert_eq!(cfg.get_services(ServiceOrder::ByName), vec![0xd210, 0xd220]);
        assert_eq!(cfg.data_for_audio_service("Two").unwrap().start_addr, 42);
        assert!(dec.is_loaded());
        assert_eq!(dec.take_events(), vec![EnsembleEvent::EnsembleLoaded]);

        assert!(dec.publish());
        assert!(!dec.publish());
        assert_eq!(dec.shared().snapshot().services.len(), 2);
    }

    #[test]
    fn component_waits_for_sub_channel() {
        let mut dec = EnsembleDecoder::default();
        feed(&mut dec, &[&audio_service(0xd210, 1, false)]);
        assert_eq!(dec.current().visible_components().count(), 0);
        assert!(!dec.is_loaded());
        feed(&mut dec, &[&sub_channel(1, 0, false)]);
        assert_eq!(dec.current().visible_components().count(), 1);
        assert!(dec.is_loaded());
    }

    #[test]
    fn expected_count_overrides_service_count() {
        let mut dec = EnsembleDecoder::default();
        // FIG 0/7: 2 services expected.
        feed(&mut dec, &[&fig0(7, false, &[0x08, 0x00]), &sub_channel(1, 0, false)]);
        feed(&mut dec, &[&audio_service(0xd210, 1, false)]);
        assert!(!dec.is_loaded());
        feed(&mut dec, &[&sub_channel(2, 42, false), &audio_service(0xd220, 2, false)]);
        assert!(dec.is_loaded());
        assert_eq!(dec.take_events(), vec![EnsembleEvent::EnsembleLoaded]);
    }

    #[test]
    fn change_flags_three_then_zero_swap_once() {
        let mut dec = loaded_decoder();
        dec.take_events();

        // Announce: service Two moves to a new sub-channel 3 at CU 84.
        feed(&mut dec, &[&ensemble_info(0x10ab, 3), &sub_channel(3, 84, true)]);
        feed(&mut dec, &[&audio_service(0xd220, 3, true)]);
        assert_eq!(dec.current().data_for_audio_service("Two").unwrap().start_addr, 42);
        assert_eq!(dec.next().sub_channels.len(), 1);
        feed(&mut dec, &[&ensemble_info(0x10ab, 3)]);
        assert_eq!(dec.swaps(), 0);

        feed(&mut dec, &[&ensemble_info(0x10ab, 0)]);
        feed(&mut dec, &[&ensemble_info(0x10ab, 0)]);
        assert_eq!(dec.swaps(), 1);
        let events = dec.take_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == EnsembleEvent::ConfigurationChanged)
                .count(),
            1
        );

        let cfg = dec.current();
        assert_eq!(cfg.data_for_audio_service("Two").unwrap().start_addr, 84);
        assert!(dec.next().sub_channels.is_empty());
        assert!(dec.next().services.is_empty());
    }

    #[test]
    fn partial_change_flags_do_not_commit() {
        let mut dec = loaded_decoder();
        dec.take_events();

        feed(&mut dec, &[&ensemble_info(0x10ab, 1), &sub_channel(3, 84, true)]);
        feed(&mut dec, &[&ensemble_info(0x10ab, 0)]);
        feed(&mut dec, &[&ensemble_info(0x10ab, 2)]);
        feed(&mut dec, &[&ensemble_info(0x10ab, 0)]);
        assert_eq!(dec.swaps(), 0);
        assert!(!dec.take_events().contains(&EnsembleEvent::ConfigurationChanged));
        assert!(!dec.current().sub_channels.contains_key(&3));
    }

    #[test]
    fn swap_keeps_untouched_services() {
        let mut dec = loaded_decoder();
        let before = dec.current().data_for_audio_service("One").unwrap();

        feed(&mut dec, &[&ensemble_info(0x10ab, 3), &sub_channel(3, 84, true)]);
        feed(&mut dec, &[&audio_service(0xd220, 3, true)]);
        feed(&mut dec, &[&ensemble_info(0x10ab, 0)]);

        let cfg = dec.current();
        assert_eq!(cfg.data_for_audio_service("One"), Some(before));
        assert_eq!(cfg.services[&0xd210].label.as_deref(), Some("One"));
        assert_eq!(cfg.services[&0xd220].label.as_deref(), Some("Two"));
        assert_eq!(cfg.get_services(ServiceOrder::ById).len(), 2);
    }

    #[test]
    fn out_of_range_sub_channel_is_ignored() {
        let mut dec = EnsembleDecoder::default();
        // Start 850 + 42 CUs runs past the 864 CU CIF.
        feed(&mut dec, &[&sub_channel(5, 850, false), &sub_channel(6, 10, false)]);
        let ids: Vec<u8> = dec.current().sub_channels.keys().copied().collect();
        assert_eq!(ids, vec![6]);
    }

    #[test]
    fn other_ensemble_records_are_ignored() {
        let mut dec = EnsembleDecoder::default();
        let mut fig = sub_channel(1, 0, false);
        fig[1] |= 0x40;
        feed(&mut dec, &[&fig]);
        assert!(dec.current().sub_channels.is_empty());
    }

    #[test]
    fn corrupted_fibs_never_reach_the_tables() {
        use crate::encode::fic_symbols;
        use crate::fic::FicDecoder;
        use dab_core::TransmissionMode;

        let p = TransmissionMode::II.params();
        let good = fib(&[&sub_channel(1, 0, false), &audio_service(0xd210, 1, false)]).unwrap();
        let mut bad = good;
        bad[3] ^= 0x40;
        let mut dec = EnsembleDecoder::default();
        let mut fic = FicDecoder::new(&p);

        let soft = |bits: &[u8]| -> Vec<i16> { bits.iter().map(|&b| if b == 1 { 127 } else { -127 }).collect() };
        for (i, s) in fic_symbols(&p, &[bad]).iter().enumerate() {
            fic.process_symbol(i, &soft(s), &mut dec);
        }
        assert!(dec.current().sub_channels.is_empty());
        assert!(dec.current().services.is_empty());

        for (i, s) in fic_symbols(&p, &[good]).iter().enumerate() {
            fic.process_symbol(i, &soft(s), &mut dec);
        }
        assert_eq!(dec.current().visible_components().count(), 1);
    }

    #[test]
    fn reset_clears_published_state() {
        let mut dec = loaded_decoder();
        dec.publish();
        dec.reset();
        assert!(dec.shared().snapshot().services.is_empty());
        assert!(dec.current().services.is_empty());
        assert!(!dec.is_loaded());
    }
}
