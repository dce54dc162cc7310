use crate::error::AtlasError;
use geo::Coord;
use serde::Deserialize;
use std::f64::consts::PI;
use std::fmt;

/// Coordinate reference systems the pipeline moves between.
///
/// Geographic coordinates follow the `geo` convention: `x` is longitude and
/// `y` is latitude, both in degrees. Grid coordinates are metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Crs {
    #[serde(rename = "EPSG:27700", alias = "bng", alias = "BNG")]
    Bng,
    #[serde(rename = "EPSG:4326", alias = "wgs84", alias = "WGS84")]
    Wgs84,
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Bng => write!(f, "EPSG:27700"),
            Crs::Wgs84 => write!(f, "EPSG:4326"),
        }
    }
}

struct Ellipsoid {
    a: f64,
    b: f64,
}

impl Ellipsoid {
    fn e2(&self) -> f64 {
        (self.a * self.a - self.b * self.b) / (self.a * self.a)
    }
}

const AIRY_1830: Ellipsoid = Ellipsoid {
    a: 6_377_563.396,
    b: 6_356_256.909,
};

const WGS84: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    b: 6_356_752.314245,
};

// National Grid true origin and scale factor on the central meridian
const F0: f64 = 0.999_601_271_7;
const LAT0: f64 = 49.0 * PI / 180.0;
const LON0: f64 = -2.0 * PI / 180.0;
const E0: f64 = 400_000.0;
const N0: f64 = -100_000.0;

// Extent of the grid squares
const GRID_MAX_EASTING: f64 = 700_000.0;
const GRID_MAX_NORTHING: f64 = 1_300_000.0;

/// Seven-parameter Helmert shift: translations in metres, scale in ppm,
/// rotations in arcseconds.
struct Helmert {
    tx: f64,
    ty: f64,
    tz: f64,
    s: f64,
    rx: f64,
    ry: f64,
    rz: f64,
}

impl Helmert {
    fn inverse(&self) -> Helmert {
        Helmert {
            tx: -self.tx,
            ty: -self.ty,
            tz: -self.tz,
            s: -self.s,
            rx: -self.rx,
            ry: -self.ry,
            rz: -self.rz,
        }
    }

    fn apply(&self, (x, y, z): (f64, f64, f64)) -> (f64, f64, f64) {
        let arcsec = PI / (180.0 * 3600.0);
        let (rx, ry, rz) = (self.rx * arcsec, self.ry * arcsec, self.rz * arcsec);
        let s1 = 1.0 + self.s * 1e-6;
        (
            self.tx + s1 * x - rz * y + ry * z,
            self.ty + rz * x + s1 * y - rx * z,
            self.tz - ry * x + rx * y + s1 * z,
        )
    }
}

const WGS84_TO_OSGB36: Helmert = Helmert {
    tx: -446.448,
    ty: 125.157,
    tz: -542.060,
    s: 20.4894,
    rx: -0.1502,
    ry: -0.2470,
    rz: -0.8421,
};

/// Transforms `coord` from `source` to `target`.
///
/// The result depends only on the input and the CRS pair, so repeated calls
/// give bit-identical output.
pub fn reproject(coord: Coord<f64>, source: Crs, target: Crs) -> Result<Coord<f64>, AtlasError> {
    check_domain(coord, source)?;
    match (source, target) {
        (Crs::Bng, Crs::Wgs84) => Ok(bng_to_wgs84(coord)),
        (Crs::Wgs84, Crs::Bng) => Ok(wgs84_to_bng(coord)),
        _ => Ok(coord),
    }
}

fn check_domain(coord: Coord<f64>, crs: Crs) -> Result<(), AtlasError> {
    let inside = match crs {
        Crs::Bng => {
            (0.0..=GRID_MAX_EASTING).contains(&coord.x)
                && (0.0..=GRID_MAX_NORTHING).contains(&coord.y)
        }
        Crs::Wgs84 => (-180.0..=180.0).contains(&coord.x) && (-90.0..=90.0).contains(&coord.y),
    };
    // NaN fails every range check above
    if inside {
        Ok(())
    } else {
        Err(AtlasError::OutOfRange {
            x: coord.x,
            y: coord.y,
            crs,
        })
    }
}

fn bng_to_wgs84(grid: Coord<f64>) -> Coord<f64> {
    let (lat, lon) = grid_to_airy(grid.x, grid.y);
    let cartesian = to_cartesian(lat, lon, &AIRY_1830);
    let shifted = WGS84_TO_OSGB36.inverse().apply(cartesian);
    let (lat, lon) = from_cartesian(shifted, &WGS84);
    Coord {
        x: lon.to_degrees(),
        y: lat.to_degrees(),
    }
}

fn wgs84_to_bng(geographic: Coord<f64>) -> Coord<f64> {
    let cartesian = to_cartesian(geographic.y.to_radians(), geographic.x.to_radians(), &WGS84);
    let shifted = WGS84_TO_OSGB36.apply(cartesian);
    let (lat, lon) = from_cartesian(shifted, &AIRY_1830);
    let (easting, northing) = airy_to_grid(lat, lon);
    Coord {
        x: easting,
        y: northing,
    }
}

/// Meridional arc from the true origin latitude to `lat`, scaled by F0.
fn meridional_arc(lat: f64) -> f64 {
    let Ellipsoid { a, b } = AIRY_1830;
    let n = (a - b) / (a + b);
    let (n2, n3) = (n * n, n * n * n);
    let dl = lat - LAT0;
    let sl = lat + LAT0;
    b * F0
        * ((1.0 + n + 1.25 * n2 + 1.25 * n3) * dl
            - (3.0 * n + 3.0 * n2 + 21.0 / 8.0 * n3) * dl.sin() * sl.cos()
            + (15.0 / 8.0 * n2 + 15.0 / 8.0 * n3) * (2.0 * dl).sin() * (2.0 * sl).cos()
            - 35.0 / 24.0 * n3 * (3.0 * dl).sin() * (3.0 * sl).cos())
}

/// Radii of curvature (nu, rho) and eta^2 at `lat` on the scaled Airy ellipsoid.
fn curvature(lat: f64) -> (f64, f64, f64) {
    let a = AIRY_1830.a;
    let e2 = AIRY_1830.e2();
    let w = 1.0 - e2 * lat.sin().powi(2);
    let nu = a * F0 / w.sqrt();
    let rho = a * F0 * (1.0 - e2) / w.powf(1.5);
    (nu, rho, nu / rho - 1.0)
}

fn airy_to_grid(lat: f64, lon: f64) -> (f64, f64) {
    let (nu, rho, eta2) = curvature(lat);
    let (sin, cos) = lat.sin_cos();
    let tan2 = lat.tan().powi(2);
    let tan4 = tan2 * tan2;
    let m = meridional_arc(lat);

    let i = m + N0;
    let ii = nu / 2.0 * sin * cos;
    let iii = nu / 24.0 * sin * cos.powi(3) * (5.0 - tan2 + 9.0 * eta2);
    let iiia = nu / 720.0 * sin * cos.powi(5) * (61.0 - 58.0 * tan2 + tan4);
    let iv = nu * cos;
    let v = nu / 6.0 * cos.powi(3) * (nu / rho - tan2);
    let vi = nu / 120.0
        * cos.powi(5)
        * (5.0 - 18.0 * tan2 + tan4 + 14.0 * eta2 - 58.0 * tan2 * eta2);

    let dl = lon - LON0;
    let northing = i + ii * dl.powi(2) + iii * dl.powi(4) + iiia * dl.powi(6);
    let easting = E0 + iv * dl + v * dl.powi(3) + vi * dl.powi(5);
    (easting, northing)
}

fn grid_to_airy(easting: f64, northing: f64) -> (f64, f64) {
    let af0 = AIRY_1830.a * F0;
    let mut lat = (northing - N0) / af0 + LAT0;
    let mut m = meridional_arc(lat);
    // Converges to 0.01mm in a handful of steps
    for _ in 0..32 {
        let residual = northing - N0 - m;
        if residual.abs() < 1e-5 {
            break;
        }
        lat += residual / af0;
        m = meridional_arc(lat);
    }

    let (nu, rho, eta2) = curvature(lat);
    let tan = lat.tan();
    let (tan2, tan4, tan6) = (tan.powi(2), tan.powi(4), tan.powi(6));
    let sec = 1.0 / lat.cos();

    let vii = tan / (2.0 * rho * nu);
    let viii = tan / (24.0 * rho * nu.powi(3)) * (5.0 + 3.0 * tan2 + eta2 - 9.0 * tan2 * eta2);
    let ix = tan / (720.0 * rho * nu.powi(5)) * (61.0 + 90.0 * tan2 + 45.0 * tan4);
    let x = sec / nu;
    let xi = sec / (6.0 * nu.powi(3)) * (nu / rho + 2.0 * tan2);
    let xii = sec / (120.0 * nu.powi(5)) * (5.0 + 28.0 * tan2 + 24.0 * tan4);
    let xiia = sec / (5040.0 * nu.powi(7)) * (61.0 + 662.0 * tan2 + 1320.0 * tan4 + 720.0 * tan6);

    let de = easting - E0;
    let lat = lat - vii * de.powi(2) + viii * de.powi(4) - ix * de.powi(6);
    let lon = LON0 + x * de - xi * de.powi(3) + xii * de.powi(5) - xiia * de.powi(7);
    (lat, lon)
}

fn to_cartesian(lat: f64, lon: f64, ellipsoid: &Ellipsoid) -> (f64, f64, f64) {
    let e2 = ellipsoid.e2();
    let (sin, cos) = lat.sin_cos();
    let nu = ellipsoid.a / (1.0 - e2 * sin * sin).sqrt();
    (
        nu * cos * lon.cos(),
        nu * cos * lon.sin(),
        (1.0 - e2) * nu * sin,
    )
}

/// Latitude and longitude of a cartesian point; ellipsoidal height is dropped.
fn from_cartesian((x, y, z): (f64, f64, f64), ellipsoid: &Ellipsoid) -> (f64, f64) {
    let e2 = ellipsoid.e2();
    let p = (x * x + y * y).sqrt();
    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..32 {
        let nu = ellipsoid.a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let next = (z + e2 * nu * lat.sin()).atan2(p);
        let done = (next - lat).abs() < 1e-13;
        lat = next;
        if done {
            break;
        }
    }
    (lat, y.atan2(x))
}
