//! The configuration store: cameras and runtime settings, backed by a
//! small sqlite database.
//!
//! Connections are opened per query; the store holds only the path. The
//! repository core takes non-owning lookups from here — cameras never
//! reference images.

pub mod camera;

pub use camera::{Camera, TimelapseSelector};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SCHEMA_MIGRATIONS: &[&[&str]] = &[&[
    "create table Version (Version int not null unique, Updated text default current_timestamp, \
     rowid integer primary key check (rowid=1))",
    "create table Settings (Key text not null unique, Value text not null default '', \
     Updated text default current_timestamp)",
    "create table Cameras (ID text not null unique, Name text not null, \
     AspectRatio text not null default '16x9', Address text not null default '', \
     Diurnal int not null default 0, Dewarp int not null default 0, \
     Latitude real not null default 0.0, Longitude real not null default 0.0, \
     Timelapse text not null default 'none', StillURL text not null default '', \
     RTSPURL text not null default '', Private int not null default 0, \
     Updated text default current_timestamp)",
    "insert into Version (Version) values (1)",
]];

const CAMERA_COLUMNS: &str =
    "ID, Name, AspectRatio, Address, Diurnal, Dewarp, Latitude, Longitude, Timelapse, StillURL, RTSPURL, Private";

pub struct CameraStore {
    sqlite_path: PathBuf,
}

impl CameraStore {
    /// Open the store at `sqlite_path`, creating or migrating the schema as
    /// needed.
    pub fn open(sqlite_path: &Path) -> Result<Self> {
        let store = Self {
            sqlite_path: sqlite_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.sqlite_path)
            .context(format!("failed to open camera database {:?}", self.sqlite_path))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;

        let version_table: Option<String> = conn
            .query_row(
                "select name from sqlite_master where type='table' and name='Version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("failed to inspect camera database schema")?;

        let current: i64 = if version_table.is_some() {
            conn.query_row("select Version from Version", [], |row| row.get(0))
                .context("version table exists but has no row")?
        } else {
            0
        };

        for step in SCHEMA_MIGRATIONS.iter().skip(current as usize) {
            for statement in *step {
                conn.execute(statement, [])
                    .context(format!("schema migration failed: {}", statement))?;
            }
        }
        Ok(())
    }

    /// All configured cameras, sorted by name.
    pub fn cameras(&self) -> Result<Vec<Camera>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(&format!("select {} from Cameras order by Name", CAMERA_COLUMNS))
            .context("failed to prepare camera query")?;
        let cameras = stmt
            .query_map([], camera_from_row)
            .context("failed to query cameras")?
            .collect::<rusqlite::Result<Vec<Camera>>>()
            .context("failed to load a camera row")?;
        Ok(cameras)
    }

    /// A specific camera, or None if the id is unknown.
    pub fn get_camera(&self, id: &str) -> Result<Option<Camera>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("select {} from Cameras where ID=?1", CAMERA_COLUMNS),
            params![id],
            camera_from_row,
        )
        .optional()
        .context(format!("failed to load camera '{}'", id))
    }

    /// Record a new camera, or update it if the id already exists.
    pub fn upsert_camera(&self, camera: &Camera) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "insert into Cameras (ID, Name, AspectRatio, Address, Diurnal, Dewarp, Latitude, \
             Longitude, Timelapse, StillURL, RTSPURL, Private) \
             values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             on conflict(ID) do update set Name=excluded.Name, AspectRatio=excluded.AspectRatio, \
             Address=excluded.Address, Diurnal=excluded.Diurnal, Dewarp=excluded.Dewarp, \
             Latitude=excluded.Latitude, Longitude=excluded.Longitude, \
             Timelapse=excluded.Timelapse, StillURL=excluded.StillURL, RTSPURL=excluded.RTSPURL, \
             Private=excluded.Private",
            params![
                camera.id,
                camera.name,
                camera.aspect_ratio,
                camera.address,
                camera.diurnal as i32,
                camera.dewarp as i32,
                camera.latitude,
                camera.longitude,
                camera.timelapse.as_str(),
                camera.still_url,
                camera.rtsp_url,
                camera.private as i32,
            ],
        )
        .context(format!("failed to upsert camera '{}'", camera.id))?;
        Ok(())
    }

    /// Remove a camera, revoking its permission to upload.
    pub fn delete_camera(&self, id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("delete from Cameras where ID=?1", params![id])
            .context(format!("failed to delete camera '{}'", id))?;
        Ok(())
    }

    /// A runtime setting, or None if unset.
    pub fn setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        conn.query_row(
            "select Value from Settings where Key=?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context(format!("failed to load setting '{}'", key))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "insert into Settings (Key, Value) values (?1, ?2) \
             on conflict(Key) do update set Value=excluded.Value",
            params![key, value],
        )
        .context(format!("failed to store setting '{}'", key))?;
        Ok(())
    }
}

fn camera_from_row(row: &Row<'_>) -> rusqlite::Result<Camera> {
    let timelapse: String = row.get("Timelapse")?;
    Ok(Camera {
        id: row.get("ID")?,
        name: row.get("Name")?,
        aspect_ratio: row.get("AspectRatio")?,
        address: row.get("Address")?,
        diurnal: row.get::<_, i32>("Diurnal")? != 0,
        dewarp: row.get::<_, i32>("Dewarp")? != 0,
        latitude: row.get("Latitude")?,
        longitude: row.get("Longitude")?,
        timelapse: TimelapseSelector::parse(&timelapse),
        still_url: row.get("StillURL")?,
        rtsp_url: row.get("RTSPURL")?,
        private: row.get::<_, i32>("Private")? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, CameraStore) {
        let dir = TempDir::new().expect("tempdir should be created");
        let store =
            CameraStore::open(&dir.path().join("config.db")).expect("store should open");
        (dir, store)
    }

    #[test]
    fn open_initializes_schema() {
        let (dir, _store) = open_store();
        let conn = Connection::open(dir.path().join("config.db")).expect("db should open");
        let cameras_table: i64 = conn
            .query_row(
                "select count(*) from sqlite_master where type='table' and name='Cameras'",
                [],
                |row| row.get(0),
            )
            .expect("query should succeed");
        assert_eq!(cameras_table, 1);
    }

    #[test]
    fn open_is_idempotent() {
        let (dir, _store) = open_store();
        CameraStore::open(&dir.path().join("config.db")).expect("reopen should not re-migrate");
    }

    #[test]
    fn camera_round_trips() {
        let (_dir, store) = open_store();
        let camera = Camera {
            id: "dachacam".to_string(),
            name: "Dacha".to_string(),
            aspect_ratio: "16x9".to_string(),
            address: "10.0.0.7".to_string(),
            diurnal: true,
            dewarp: true,
            timelapse: TimelapseSelector::Both,
            still_url: "http://10.0.0.7/still.jpg".to_string(),
            rtsp_url: String::new(),
            latitude: 55.75,
            longitude: 37.61,
            private: true,
        };
        store.upsert_camera(&camera).expect("insert should succeed");

        let loaded = store
            .get_camera("dachacam")
            .expect("lookup should succeed")
            .expect("camera should exist");
        assert_eq!(loaded.name, "Dacha");
        assert!(loaded.diurnal);
        assert!(loaded.dewarp);
        assert!(loaded.private);
        assert_eq!(loaded.timelapse, TimelapseSelector::Both);
        assert_eq!(loaded.latitude, 55.75);

        assert!(store
            .get_camera("nobody")
            .expect("lookup should succeed")
            .is_none());
    }

    #[test]
    fn upsert_updates_in_place() {
        let (_dir, store) = open_store();
        let mut camera = Camera {
            id: "cam1".to_string(),
            name: "Front".to_string(),
            ..Camera::default()
        };
        store.upsert_camera(&camera).expect("insert should succeed");
        camera.name = "Front door".to_string();
        camera.dewarp = true;
        store.upsert_camera(&camera).expect("update should succeed");

        let cameras = store.cameras().expect("list should succeed");
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "Front door");
        assert!(cameras[0].dewarp);
    }

    #[test]
    fn cameras_sorted_by_name() {
        let (_dir, store) = open_store();
        for (id, name) in [("c1", "Zulu"), ("c2", "Alpha"), ("c3", "Mike")] {
            store
                .upsert_camera(&Camera {
                    id: id.to_string(),
                    name: name.to_string(),
                    ..Camera::default()
                })
                .expect("insert should succeed");
        }
        let names: Vec<String> = store
            .cameras()
            .expect("list should succeed")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Mike", "Zulu"]);
    }

    #[test]
    fn delete_removes_camera() {
        let (_dir, store) = open_store();
        store
            .upsert_camera(&Camera {
                id: "cam1".to_string(),
                name: "Front".to_string(),
                ..Camera::default()
            })
            .expect("insert should succeed");
        store.delete_camera("cam1").expect("delete should succeed");
        assert!(store.get_camera("cam1").expect("lookup").is_none());
    }

    #[test]
    fn settings_round_trip() {
        let (_dir, store) = open_store();
        assert!(store.setting("PollInterval").expect("lookup").is_none());
        store
            .set_setting("PollInterval", "30")
            .expect("set should succeed");
        store
            .set_setting("PollInterval", "60")
            .expect("overwrite should succeed");
        assert_eq!(
            store.setting("PollInterval").expect("lookup").as_deref(),
            Some("60")
        );
    }
}
