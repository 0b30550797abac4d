// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FIG records.
//!
//! A FIB carries a sequence of FIGs, each introduced by a one-byte header
//! (3-bit type, 5-bit length) and terminated early by `0xFF`. Every FIG is
//! parsed into a [`Fig`] record; a truncated trailing entry is dropped and
//! unknown types are skipped without affecting their neighbours.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::bits::BitReader;
use crate::charset::{decode_label, short_label, Charset};
use crate::crc::FIB_DATA_BYTES;
use crate::protection::Protection;

const END_MARKER: u8 = 0xff;

/// One parsed FIG with its header flags.
#[derive(Debug, Clone, PartialEq)]
pub struct FigRecord {
    /// Next-configuration flag (FIG type 0 only).
    pub next: bool,
    /// Information about another ensemble.
    pub other_ensemble: bool,
    pub fig: Fig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fig {
    /// 0/0
    EnsembleInfo(EnsembleInfo),
    /// 0/1
    SubChannels(Vec<SubChannelDef>),
    /// 0/2
    Services(Vec<ServiceDef>),
    /// 0/3
    PacketComponents(Vec<PacketDef>),
    /// 0/5
    Languages(Vec<LanguageDef>),
    /// 0/7: number of services and configuration counter.
    ConfigurationInfo { services: u8, count: u16 },
    /// 0/8
    GlobalDefinitions(Vec<GlobalDef>),
    /// 0/9
    Country(CountryInfo),
    /// 0/10
    DateTime { utc: NaiveDateTime, leap_second: bool },
    /// 0/13
    UserApplications(Vec<UserAppDef>),
    /// 0/14: `(sub-channel, FEC scheme)` pairs.
    FecSchemes(Vec<(u8, u8)>),
    /// 0/17
    ProgrammeTypes(Vec<PtyDef>),
    /// 0/18
    AnnouncementSupport(Vec<AnnouncementSupportDef>),
    /// 0/19
    AnnouncementSwitching(Vec<AnnouncementSwitchDef>),
    /// 0/21
    FrequencyInfo(Vec<FrequencyDef>),
    /// 1/0, 1/1, 1/4, 1/5
    Label(LabelDef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleInfo {
    pub eid: u16,
    pub change_flags: u8,
    pub alarm: bool,
    pub cif_count: u16,
    pub occurrence_change: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubChannelForm {
    Short { table_switch: bool, table_index: u8 },
    Long { option: u8, level_code: u8, size: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubChannelDef {
    pub id: u8,
    pub start_addr: u16,
    pub form: SubChannelForm,
}

impl SubChannelDef {
    /// Protection profile, size in CUs and bit rate, if the coded form is
    /// one this receiver knows.
    pub fn resolve(&self) -> Option<(Protection, u16, u16)> {
        match self.form {
            SubChannelForm::Short {
                table_switch: false,
                table_index,
            } => Protection::from_short_form(table_index),
            SubChannelForm::Short { .. } => None,
            SubChannelForm::Long {
                option,
                level_code,
                size,
            } => Protection::from_long_form(option, level_code, size)
                .map(|(p, rate)| (p, size, rate)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// TMId 0, MSC stream audio.
    Audio { ascty: u8, sub_channel: u8 },
    /// TMId 1, MSC stream data.
    StreamData { dscty: u8, sub_channel: u8 },
    /// TMId 3, MSC packet data.
    Packet { scid: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDef {
    pub kind: ComponentKind,
    pub primary: bool,
    pub access_control: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    pub sid: u32,
    pub data_service: bool,
    pub ca_id: u8,
    pub components: Vec<ComponentDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketDef {
    pub scid: u16,
    pub data_groups: bool,
    pub dscty: u8,
    pub sub_channel: u8,
    pub packet_address: u16,
    pub ca_org: Option<u16>,
}

/// Component reference used by FIG 0/5 and 0/8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRef {
    SubChannel(u8),
    Scid(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageDef {
    pub target: ComponentRef,
    pub language: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalDef {
    pub sid: u32,
    pub scids: u8,
    pub target: ComponentRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryInfo {
    /// Local time offset in half hours.
    pub lto: i8,
    pub ecc: u8,
    pub table_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserApp {
    pub app_type: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAppDef {
    pub sid: u32,
    pub scids: u8,
    pub apps: Vec<UserApp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtyDef {
    pub sid: u16,
    pub dynamic: bool,
    pub language: Option<u8>,
    pub international_code: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementSupportDef {
    pub sid: u16,
    pub support_flags: u16,
    pub clusters: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementSwitchDef {
    pub cluster: u8,
    pub switch_flags: u16,
    pub new: bool,
    pub sub_channel: u8,
    pub region: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyDef {
    /// EId for DAB entries, PI code for FM entries.
    pub id: u16,
    /// Range and modulation code.
    pub range_modulation: u8,
    pub continuity: bool,
    /// Frequencies in kHz.
    pub frequencies_khz: Vec<u32>,
}

impl FrequencyDef {
    pub const RM_DAB: u8 = 0b0000;
    pub const RM_FM_RDS: u8 = 0b1000;
    pub const RM_FM: u8 = 0b1001;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    Ensemble(u16),
    Service(u32),
    Component { sid: u32, scids: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDef {
    pub target: LabelTarget,
    pub charset: Charset,
    pub label: String,
    pub short: String,
}

/// Parse every FIG of a valid FIB.
pub fn parse_fib(fib: &[u8]) -> Vec<FigRecord> {
    let data = &fib[..fib.len().min(FIB_DATA_BYTES)];
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let header = data[pos];
        if header == END_MARKER {
            break;
        }
        let kind = header >> 5;
        let len = (header & 0x1f) as usize;
        let Some(body) = data.get(pos + 1..pos + 1 + len) else {
            tracing::trace!("FIG type {} overruns its FIB", kind);
            break;
        };
        pos += 1 + len;

        let record = match kind {
            0 => parse_type0(body),
            1 => parse_type1(body),
            _ => None,
        };
        records.extend(record);
    }
    records
}

fn parse_type0(body: &[u8]) -> Option<FigRecord> {
    let (&head, payload) = body.split_first()?;
    let next = head & 0x80 != 0;
    let other_ensemble = head & 0x40 != 0;
    let pd = head & 0x20 != 0;
    let ext = head & 0x1f;

    let fig = match ext {
        0 => Fig::EnsembleInfo(ensemble_info(payload)?),
        1 => Fig::SubChannels(entries(payload, sub_channel)),
        2 => Fig::Services(entries(payload, |r| service(r, pd))),
        3 => Fig::PacketComponents(entries(payload, packet)),
        5 => Fig::Languages(entries(payload, language)),
        7 => {
            let mut r = BitReader::new(payload);
            Fig::ConfigurationInfo {
                services: r.read(6)? as u8,
                count: r.read(10)? as u16,
            }
        }
        8 => Fig::GlobalDefinitions(entries(payload, |r| global(r, pd))),
        9 => Fig::Country(country(payload)?),
        10 => date_time(payload)?,
        13 => Fig::UserApplications(entries(payload, |r| user_apps(r, pd))),
        14 => Fig::FecSchemes(entries(payload, |r| {
            Some((r.read(6)? as u8, r.read(2)? as u8))
        })),
        17 => Fig::ProgrammeTypes(entries(payload, pty)),
        18 => Fig::AnnouncementSupport(entries(payload, announcement_support)),
        19 => Fig::AnnouncementSwitching(entries(payload, announcement_switch)),
        21 => Fig::FrequencyInfo(frequency_info(payload)),
        _ => return None,
    };
    Some(FigRecord {
        next,
        other_ensemble,
        fig,
    })
}

/// Repeatedly apply `parse` until the payload is exhausted or an entry is
/// truncated.
fn entries<'a, T>(data: &'a [u8], mut parse: impl FnMut(&mut BitReader<'a>) -> Option<T>) -> Vec<T> {
    let mut r = BitReader::new(data);
    let mut out = Vec::new();
    while !r.is_empty() {
        match parse(&mut r) {
            Some(v) => out.push(v),
            None => break,
        }
    }
    out
}

fn read_sid(r: &mut BitReader, pd: bool) -> Option<u32> {
    r.read(if pd { 32 } else { 16 })
}

fn ensemble_info(payload: &[u8]) -> Option<EnsembleInfo> {
    let mut r = BitReader::new(payload);
    let eid = r.read(16)? as u16;
    let change_flags = r.read(2)? as u8;
    let alarm = r.read_flag()?;
    let high = r.read(5)? as u16;
    let low = r.read(8)? as u16;
    let occurrence_change = if change_flags != 0 {
        r.read(8).map(|v| v as u8)
    } else {
        None
    };
    Some(EnsembleInfo {
        eid,
        change_flags,
        alarm,
        cif_count: high * 250 + low,
        occurrence_change,
    })
}

fn sub_channel(r: &mut BitReader) -> Option<SubChannelDef> {
    let id = r.read(6)? as u8;
    let start_addr = r.read(10)? as u16;
    let long = r.read_flag()?;
    let form = if long {
        SubChannelForm::Long {
            option: r.read(3)? as u8,
            level_code: r.read(2)? as u8,
            size: r.read(10)? as u16,
        }
    } else {
        SubChannelForm::Short {
            table_switch: r.read_flag()?,
            table_index: r.read(6)? as u8,
        }
    };
    Some(SubChannelDef {
        id,
        start_addr,
        form,
    })
}

fn service(r: &mut BitReader, pd: bool) -> Option<ServiceDef> {
    let sid = read_sid(r, pd)?;
    r.skip(1)?; // local flag
    let ca_id = r.read(3)? as u8;
    let count = r.read(4)? as usize;
    let mut components = Vec::with_capacity(count);
    for _ in 0..count {
        let tmid = r.read(2)?;
        let kind = match tmid {
            0 => Some(ComponentKind::Audio {
                ascty: r.read(6)? as u8,
                sub_channel: r.read(6)? as u8,
            }),
            1 => Some(ComponentKind::StreamData {
                dscty: r.read(6)? as u8,
                sub_channel: r.read(6)? as u8,
            }),
            3 => Some(ComponentKind::Packet {
                scid: r.read(12)? as u16,
            }),
            _ => {
                r.skip(12)?;
                None
            }
        };
        let primary = r.read_flag()?;
        let access_control = r.read_flag()?;
        if let Some(kind) = kind {
            components.push(ComponentDef {
                kind,
                primary,
                access_control,
            });
        }
    }
    Some(ServiceDef {
        sid,
        data_service: pd,
        ca_id,
        components,
    })
}

fn packet(r: &mut BitReader) -> Option<PacketDef> {
    let scid = r.read(12)? as u16;
    r.skip(3)?;
    let has_ca_org = r.read_flag()?;
    // DG flag set means data groups are not used.
    let data_groups = !r.read_flag()?;
    r.skip(1)?;
    let dscty = r.read(6)? as u8;
    let sub_channel = r.read(6)? as u8;
    let packet_address = r.read(10)? as u16;
    let ca_org = if has_ca_org {
        Some(r.read(16)? as u16)
    } else {
        None
    };
    Some(PacketDef {
        scid,
        data_groups,
        dscty,
        sub_channel,
        packet_address,
        ca_org,
    })
}

fn component_ref(r: &mut BitReader) -> Option<ComponentRef> {
    if r.read_flag()? {
        r.skip(3)?;
        Some(ComponentRef::Scid(r.read(12)? as u16))
    } else {
        r.skip(1)?;
        Some(ComponentRef::SubChannel(r.read(6)? as u8))
    }
}

fn language(r: &mut BitReader) -> Option<LanguageDef> {
    let target = component_ref(r)?;
    let language = r.read(8)? as u8;
    Some(LanguageDef { target, language })
}

fn global(r: &mut BitReader, pd: bool) -> Option<GlobalDef> {
    let sid = read_sid(r, pd)?;
    let ext = r.read_flag()?;
    r.skip(3)?;
    let scids = r.read(4)? as u8;
    let target = component_ref(r)?;
    if ext {
        r.skip(8)?;
    }
    Some(GlobalDef { sid, scids, target })
}

fn country(payload: &[u8]) -> Option<CountryInfo> {
    let mut r = BitReader::new(payload);
    r.skip(2)?; // extension flag, LTO unique
    let negative = r.read_flag()?;
    let half_hours = r.read(5)? as i8;
    let ecc = r.read(8)? as u8;
    let table_id = r.read(8)? as u8;
    Some(CountryInfo {
        lto: if negative { -half_hours } else { half_hours },
        ecc,
        table_id,
    })
}

fn date_time(payload: &[u8]) -> Option<Fig> {
    let mut r = BitReader::new(payload);
    r.skip(1)?;
    let mjd = r.read(17)?;
    let leap_second = r.read_flag()?;
    r.skip(1)?;
    let long_form = r.read_flag()?;
    let hours = r.read(5)?;
    let minutes = r.read(6)?;
    let (seconds, millis) = if long_form {
        (r.read(6)?, r.read(10)?)
    } else {
        (0, 0)
    };
    let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)?;
    let date = epoch.checked_add_days(Days::new(u64::from(mjd)))?;
    let time = NaiveTime::from_hms_milli_opt(hours, minutes, seconds, millis)?;
    Some(Fig::DateTime {
        utc: date.and_time(time),
        leap_second,
    })
}

fn user_apps(r: &mut BitReader, pd: bool) -> Option<UserAppDef> {
    let sid = read_sid(r, pd)?;
    let scids = r.read(4)? as u8;
    let count = r.read(4)? as usize;
    let mut apps = Vec::with_capacity(count);
    for _ in 0..count {
        let app_type = r.read(11)? as u16;
        let len = r.read(5)? as usize;
        let data = r.read_bytes(len)?.to_vec();
        apps.push(UserApp { app_type, data });
    }
    Some(UserAppDef { sid, scids, apps })
}

fn pty(r: &mut BitReader) -> Option<PtyDef> {
    let sid = r.read(16)? as u16;
    let dynamic = r.read_flag()?;
    r.skip(1)?;
    let has_language = r.read_flag()?;
    let has_complementary = r.read_flag()?;
    r.skip(4)?;
    let language = if has_language {
        Some(r.read(8)? as u8)
    } else {
        None
    };
    r.skip(3)?;
    let international_code = r.read(5)? as u8;
    if has_complementary {
        r.skip(8)?;
    }
    Some(PtyDef {
        sid,
        dynamic,
        language,
        international_code,
    })
}

fn announcement_support(r: &mut BitReader) -> Option<AnnouncementSupportDef> {
    let sid = r.read(16)? as u16;
    let support_flags = r.read(16)? as u16;
    r.skip(3)?;
    let count = r.read(5)? as usize;
    let clusters = (0..count)
        .map(|_| r.read(8).map(|v| v as u8))
        .collect::<Option<Vec<u8>>>()?;
    Some(AnnouncementSupportDef {
        sid,
        support_flags,
        clusters,
    })
}

fn announcement_switch(r: &mut BitReader) -> Option<AnnouncementSwitchDef> {
    let cluster = r.read(8)? as u8;
    let switch_flags = r.read(16)? as u16;
    let new = r.read_flag()?;
    let has_region = r.read_flag()?;
    let sub_channel = r.read(6)? as u8;
    let region = if has_region {
        r.skip(2)?;
        Some(r.read(6)? as u8)
    } else {
        None
    };
    Some(AnnouncementSwitchDef {
        cluster,
        switch_flags,
        new,
        sub_channel,
        region,
    })
}

fn frequency_info(payload: &[u8]) -> Vec<FrequencyDef> {
    let mut out = Vec::new();
    let mut r = BitReader::new(payload);
    while !r.is_empty() {
        let Some(list_len) = r.skip(11).and_then(|_| r.read(5)) else {
            break;
        };
        let Some(list) = r.read_bytes(list_len as usize) else {
            break;
        };
        out.extend(entries(list, frequency_entry));
    }
    out
}

fn frequency_entry(r: &mut BitReader) -> Option<FrequencyDef> {
    let id = r.read(16)? as u16;
    let range_modulation = r.read(4)? as u8;
    let continuity = r.read_flag()?;
    let len = r.read(3)? as usize;
    let bytes = r.read_bytes(len)?;
    let frequencies_khz = match range_modulation {
        FrequencyDef::RM_DAB => bytes
            .chunks_exact(3)
            .map(|c| {
                let raw = (u32::from(c[0] & 0x07) << 16) | (u32::from(c[1]) << 8) | u32::from(c[2]);
                raw * 16
            })
            .collect(),
        FrequencyDef::RM_FM_RDS | FrequencyDef::RM_FM => bytes
            .iter()
            .filter(|&&b| (1..=204).contains(&b))
            .map(|&b| 87_500 + u32::from(b) * 100)
            .collect(),
        _ => Vec::new(),
    };
    Some(FrequencyDef {
        id,
        range_modulation,
        continuity,
        frequencies_khz,
    })
}

fn parse_type1(body: &[u8]) -> Option<FigRecord> {
    let (&head, payload) = body.split_first()?;
    let charset = Charset::from_code(head >> 4)?;
    let other_ensemble = head & 0x08 != 0;
    let ext = head & 0x07;

    let mut r = BitReader::new(payload);
    let target = match ext {
        0 => LabelTarget::Ensemble(r.read(16)? as u16),
        1 => LabelTarget::Service(r.read(16)?),
        4 => {
            let pd = r.read_flag()?;
            r.skip(3)?;
            let scids = r.read(4)? as u8;
            LabelTarget::Component {
                sid: read_sid(&mut r, pd)?,
                scids,
            }
        }
        5 => LabelTarget::Service(r.read(32)?),
        _ => return None,
    };
    let text = r.read_bytes(16)?;
    let flags = r.read(16)? as u16;
    Some(FigRecord {
        next: false,
        other_ensemble,
        fig: Fig::Label(LabelDef {
            target,
            charset,
            label: decode_label(text, charset),
            short: short_label(text, charset, flags),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fig0(ext: u8, next: bool, pd: bool, payload: &[u8]) -> Vec<u8> {
        let mut fig = vec![(payload.len() + 1) as u8];
        fig.push(((next as u8) << 7) | ((pd as u8) << 5) | ext);
        fig.extend_from_slice(payload);
        fig
    }

    fn parse_one(fig: &[u8]) -> FigRecord {
        let mut fib = fig.to_vec();
        fib.push(END_MARKER);
        let mut records = parse_fib(&fib);
        assert_eq!(records.len(), 1, "{:?}", records);
        records.remove(0)
    }

    #[test]
    fn ensemble_info_with_change_announcement() {
        // EId 0x10ab, change flags 3, alarm 0, CIF count 3*250 + 7, occurrence 42.
        let rec = parse_one(&fig0(0, false, false, &[0x10, 0xab, 0xc3, 0x07, 42]));
        assert_eq!(
            rec.fig,
            Fig::EnsembleInfo(EnsembleInfo {
                eid: 0x10ab,
                change_flags: 3,
                alarm: false,
                cif_count: 757,
                occurrence_change: Some(42),
            })
        );
    }

    #[test]
    fn sub_channels_short_and_long_form() {
        // SubCh 1 @ 0, short, index 12; SubCh 2 @ 84, long, EEP 3-A, 72 CUs.
        let payload = [0x04, 0x00, 0x0c, 0x08, 0x54, 0x88, 0x48];
        let rec = parse_one(&fig0(1, true, false, &payload));
        assert!(rec.next);
        let Fig::SubChannels(list) = rec.fig else {
            panic!("wrong record");
        };
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, 1);
        assert_eq!(list[0].resolve().map(|(_, s, r)| (s, r)), Some((42, 56)));
        assert_eq!(list[1].start_addr, 84);
        assert_eq!(
            list[1].resolve(),
            Some((Protection::EepA { level: 3 }, 72, 96))
        );
    }

    #[test]
    fn service_with_audio_and_packet_components() {
        // SId 0xd210, 2 components: audio ASCTy 63 subch 1 primary, packet SCId 5.
        let payload = [0xd2, 0x10, 0x02, 0x3f, 0x06, 0xc0, 0x14];
        let rec = parse_one(&fig0(2, false, false, &payload));
        let Fig::Services(list) = rec.fig else {
            panic!("wrong record");
        };
        assert_eq!(list[0].sid, 0xd210);
        assert_eq!(
            list[0].components,
            vec![
                ComponentDef {
                    kind: ComponentKind::Audio {
                        ascty: 63,
                        sub_channel: 1
                    },
                    primary: true,
                    access_control: false,
                },
                ComponentDef {
                    kind: ComponentKind::Packet { scid: 5 },
                    primary: false,
                    access_control: false,
                },
            ]
        );
    }

    #[test]
    fn truncated_entry_is_dropped() {
        // Second sub-channel entry cut after two bytes.
        let payload = [0x04, 0x00, 0x0c, 0x08, 0x54];
        let rec = parse_one(&fig0(1, false, false, &payload));
        let Fig::SubChannels(list) = rec.fig else {
            panic!("wrong record");
        };
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn date_and_time() {
        // MJD 60000 = 2023-02-25, 12:34 short form.
        let mjd: u32 = 60000;
        let word = (mjd << 14) | (12 << 6) | 34;
        let rec = parse_one(&fig0(10, false, false, &word.to_be_bytes()));
        let Fig::DateTime { utc, leap_second } = rec.fig else {
            panic!("wrong record");
        };
        assert!(!leap_second);
        assert_eq!(utc.to_string(), "2023-02-25 12:34:00");
    }

    #[test]
    fn service_label() {
        let mut fig = vec![(1 + 2 + 16 + 2) | 0x20, 0x01, 0xd2, 0x10];
        fig.extend_from_slice(b"Radio One       ");
        fig.extend_from_slice(&[0xf8, 0x00]);
        let rec = parse_one(&fig);
        assert_eq!(
            rec.fig,
            Fig::Label(LabelDef {
                target: LabelTarget::Service(0xd210),
                charset: Charset::EbuLatin,
                label: "Radio One".into(),
                short: "Radio".into(),
            })
        );
    }

    #[test]
    fn fm_frequency_list() {
        // FI list of 5 bytes: PI 0xd210, R&M FM+RDS, 2 frequencies.
        let payload = [0x00, 0x05, 0xd2, 0x10, 0x82, 0x0f, 0x64];
        let rec = parse_one(&fig0(21, false, false, &payload));
        let Fig::FrequencyInfo(list) = rec.fig else {
            panic!("wrong record");
        };
        assert_eq!(list[0].id, 0xd210);
        assert_eq!(list[0].frequencies_khz, vec![89_000, 97_500]);
    }

    #[test]
    fn end_marker_and_unknown_types_are_skipped() {
        let mut fib = vec![0xa2, 0x00, 0x00]; // type 5, ignored
        fib.extend(fig0(7, false, false, &[0x0c, 0x05]));
        fib.push(END_MARKER);
        fib.extend(fig0(7, false, false, &[0x00, 0x00]));
        let records = parse_fib(&fib);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].fig,
            Fig::ConfigurationInfo {
                services: 3,
                count: 5
            }
        );
    }

    #[test]
    fn overrunning_fig_stops_parsing() {
        let fib = [0x1f, 0x00, 0x01];
        assert!(parse_fib(&fib).is_empty());
    }
}
