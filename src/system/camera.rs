//! Camera metadata and daylight computation.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

use crate::common::INGEST_DARK_MARGIN_MINS;
use crate::repository::MediaKind;

static TZ_FINDER: LazyLock<DefaultFinder> = LazyLock::new(DefaultFinder::new);

/// Which kinds of media a camera wants daily timelapses generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelapseSelector {
    Collected,
    Motion,
    Both,
    #[default]
    None,
}

impl TimelapseSelector {
    pub fn includes(self, kind: MediaKind) -> bool {
        match self {
            TimelapseSelector::Collected => kind == MediaKind::Collected,
            TimelapseSelector::Motion => kind == MediaKind::Motion,
            TimelapseSelector::Both => {
                matches!(kind, MediaKind::Collected | MediaKind::Motion)
            }
            TimelapseSelector::None => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimelapseSelector::Collected => "collected",
            TimelapseSelector::Motion => "motion",
            TimelapseSelector::Both => "both",
            TimelapseSelector::None => "none",
        }
    }

    /// Anything unrecognized from the database means no timelapses.
    pub fn parse(value: &str) -> TimelapseSelector {
        match value {
            "collected" => TimelapseSelector::Collected,
            "motion" => TimelapseSelector::Motion,
            "both" => TimelapseSelector::Both,
            _ => TimelapseSelector::None,
        }
    }
}

/// A device permitted to upload images, along with the metadata that gates
/// what enters the store and what a timelapse covers.
#[derive(Debug, Clone, Default)]
pub struct Camera {
    pub id: String,
    pub name: String,
    pub aspect_ratio: String,
    pub address: String,
    /// Ingest and timelapse narrow to local daylight hours.
    pub diurnal: bool,
    /// Ingress bytes get fisheye correction before hashing.
    pub dewarp: bool,
    pub timelapse: TimelapseSelector,
    pub still_url: String,
    pub rtsp_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub private: bool,
}

impl Camera {
    /// The camera's timezone, according to its latitude and longitude.
    pub fn location(&self) -> Option<Tz> {
        let name = TZ_FINDER.get_tz_name(self.longitude, self.latitude);
        if name.is_empty() {
            return None;
        }
        name.parse().ok()
    }

    /// Raw sunrise and sunset instants for `date` in the camera's local
    /// time. None when no timezone can be resolved.
    pub fn local_daylight(&self, date: NaiveDate) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        let tz = self.location()?;
        let (rise, set) = sunrise::sunrise_sunset(
            self.latitude,
            self.longitude,
            date.year(),
            date.month(),
            date.day(),
        );
        let rise = Utc.timestamp_opt(rise, 0).single()?.with_timezone(&tz);
        let set = Utc.timestamp_opt(set, 0).single()?.with_timezone(&tz);
        Some((rise, set))
    }

    /// Whether the camera is currently offline/sleeping due to darkness,
    /// with a 15-minute grace margin on both sides. Non-diurnal cameras
    /// (and cameras with nonsense coordinates) are never dark.
    ///
    /// This check belongs to the ingest handler; the repository itself
    /// stores whatever it is given.
    pub fn is_dark(&self, now: DateTime<Utc>) -> bool {
        if !self.diurnal || (self.latitude == 0.0 && self.longitude == 0.0) {
            return false;
        }
        let Some(tz) = self.location() else {
            return false;
        };
        let today = now.with_timezone(&tz).date_naive();
        let Some((rise, set)) = self.local_daylight(today) else {
            return false;
        };
        let rise = rise - Duration::minutes(INGEST_DARK_MARGIN_MINS);
        let set = set + Duration::minutes(INGEST_DARK_MARGIN_MINS);
        now < rise || now > set
    }
}
