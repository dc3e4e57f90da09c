// Instance directory reader and writer.
//
// An instance is a directory of six whitespace-separated text files. Empty
// lines and lines starting with "..." are ignored everywhere.

use crate::models::{
    CircuitId, Cost, DistanceMatrix, InstanceError, Metadata, ProductId, RackId,
    WarehouseInstance,
};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const DISTANCES_FILE: &str = "rack_adjacency_matrix.txt";
pub const CAPACITIES_FILE: &str = "rack_capacity.txt";
pub const CIRCUITS_FILE: &str = "product_circuit.txt";
pub const AISLES_FILE: &str = "aisle_racks.txt";
pub const ORDERS_FILE: &str = "orders.txt";
pub const METADATA_FILE: &str = "metadata.txt";

/// A meaningful line of an instance file with its 1-based line number
struct Line {
    number: usize,
    text: String,
}

// Read the meaningful lines of one instance file
fn read_lines(dir: &Path, file: &str) -> Result<Vec<Line>, InstanceError> {
    let path = dir.join(file);
    let io_error = |source| InstanceError::Io {
        path: path.clone(),
        source,
    };
    let reader = io::BufReader::new(File::open(&path).map_err(io_error)?);

    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        let text = line.trim();
        if text.is_empty() || text.starts_with("...") {
            continue;
        }
        lines.push(Line {
            number: index + 1,
            text: text.to_string(),
        });
    }
    Ok(lines)
}

fn parse_error(file: &str, line: usize, message: String) -> InstanceError {
    InstanceError::Parse {
        file: file.to_string(),
        line,
        message,
    }
}

fn parse_value<T>(file: &str, line: &Line, token: &str) -> Result<T, InstanceError>
where
    T: FromStr,
    T::Err: Display,
{
    token
        .parse()
        .map_err(|err| parse_error(file, line.number, format!("{:?}: {}", token, err)))
}

fn parse_row<T>(file: &str, line: &Line) -> Result<Vec<T>, InstanceError>
where
    T: FromStr,
    T::Err: Display,
{
    line.text
        .split_whitespace()
        .map(|token| parse_value(file, line, token))
        .collect()
}

// Header line, then one value per line
fn parse_column<T>(file: &str, lines: &[Line]) -> Result<Vec<T>, InstanceError>
where
    T: FromStr,
    T::Err: Display,
{
    lines
        .iter()
        .skip(1)
        .map(|line| parse_value(file, line, &line.text))
        .collect()
}

// Header line, then `<count> <id> <id> ...` per line
fn parse_lists(file: &str, lines: &[Line]) -> Result<Vec<Vec<usize>>, InstanceError> {
    lines
        .iter()
        .skip(1)
        .map(|line| {
            let row: Vec<usize> = parse_row(file, line)?;
            let Some((&count, ids)) = row.split_first() else {
                return Err(parse_error(file, line.number, "missing count".into()));
            };
            if count != ids.len() {
                return Err(parse_error(
                    file,
                    line.number,
                    format!("declares {} ids but lists {}", count, ids.len()),
                ));
            }
            Ok(ids.to_vec())
        })
        .collect()
}

/// Reads the distance matrix: `n`, then `n` rows of `n` integers
pub fn load_distances(dir: &Path) -> Result<DistanceMatrix, InstanceError> {
    let lines = read_lines(dir, DISTANCES_FILE)?;
    let Some(header) = lines.first() else {
        return Err(parse_error(DISTANCES_FILE, 0, "file is empty".into()));
    };
    let n: usize = parse_value(DISTANCES_FILE, header, &header.text)?;
    if lines.len() < n + 1 {
        return Err(parse_error(
            DISTANCES_FILE,
            header.number,
            format!("expected {} rows, found {}", n, lines.len() - 1),
        ));
    }

    let mut rows = Vec::with_capacity(n);
    for line in &lines[1..=n] {
        let row: Vec<Cost> = parse_row(DISTANCES_FILE, line)?;
        if row.len() != n {
            return Err(parse_error(
                DISTANCES_FILE,
                line.number,
                format!("expected {} values, found {}", n, row.len()),
            ));
        }
        rows.push(row);
    }
    DistanceMatrix::from_rows(rows)
        .ok_or_else(|| InstanceError::Inconsistent("distance matrix is not square".into()))
}

pub fn load_capacities(dir: &Path) -> Result<Vec<u32>, InstanceError> {
    parse_column(CAPACITIES_FILE, &read_lines(dir, CAPACITIES_FILE)?)
}

pub fn load_circuits(dir: &Path) -> Result<Vec<CircuitId>, InstanceError> {
    parse_column(CIRCUITS_FILE, &read_lines(dir, CIRCUITS_FILE)?)
}

pub fn load_aisles(dir: &Path) -> Result<Vec<Vec<RackId>>, InstanceError> {
    parse_lists(AISLES_FILE, &read_lines(dir, AISLES_FILE)?)
}

pub fn load_orders(dir: &Path) -> Result<Vec<Vec<ProductId>>, InstanceError> {
    parse_lists(ORDERS_FILE, &read_lines(dir, ORDERS_FILE)?)
}

/// Reads the metadata values in their fixed key order
pub fn load_metadata(dir: &Path) -> Result<Metadata, InstanceError> {
    let lines = read_lines(dir, METADATA_FILE)?;
    if lines.len() < 7 {
        return Err(parse_error(
            METADATA_FILE,
            lines.last().map_or(0, |l| l.number),
            format!("expected 7 values, found {}", lines.len()),
        ));
    }
    let int = |index: usize| -> Result<usize, InstanceError> {
        parse_value(METADATA_FILE, &lines[index], &lines[index].text)
    };
    Ok(Metadata {
        num_racks: int(0)?,
        total_slots: parse_value(METADATA_FILE, &lines[1], &lines[1].text)?,
        aeration_rate: parse_value(METADATA_FILE, &lines[2], &lines[2].text)?,
        num_products: int(3)?,
        num_circuits: int(4)?,
        num_aisles: int(5)?,
        num_orders: int(6)?,
    })
}

/// Loads and validates the instance stored in `dir`.
///
/// The instance is named after the directory. The rack, product, aisle and
/// order counts of the metadata must agree with the data files; the slot
/// and circuit totals are informative only.
pub fn load_instance<P: AsRef<Path>>(dir: P) -> Result<WarehouseInstance, InstanceError> {
    let dir = dir.as_ref();
    debug!(dir = %dir.display(), "loading instance");

    let metadata = load_metadata(dir)?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "instance".to_string());

    let instance = WarehouseInstance::new(
        name,
        load_capacities(dir)?,
        load_circuits(dir)?,
        load_aisles(dir)?,
        load_orders(dir)?,
        load_distances(dir)?,
        metadata.aeration_rate,
    )?;

    let derived = instance.metadata();
    let counts = |m: &Metadata| (m.num_racks, m.num_products, m.num_aisles, m.num_orders);
    if counts(&derived) != counts(&metadata) {
        return Err(InstanceError::Inconsistent(format!(
            "metadata {:?} disagrees with the data files {:?}",
            metadata, derived
        )));
    }
    if derived.total_slots != metadata.total_slots || derived.num_circuits != metadata.num_circuits
    {
        warn!(
            total_slots = metadata.total_slots,
            derived_slots = derived.total_slots,
            num_circuits = metadata.num_circuits,
            derived_circuits = derived.num_circuits,
            "metadata summary differs from the data files, using the data files"
        );
    }

    info!(
        instance = %instance.name,
        racks = instance.num_racks(),
        products = instance.num_products(),
        aisles = instance.num_aisles(),
        orders = instance.num_orders(),
        "instance loaded"
    );
    Ok(instance)
}

fn write_file<F>(dir: &Path, file: &str, body: F) -> Result<(), InstanceError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let path = dir.join(file);
    let result = File::create(&path).and_then(|f| {
        let mut writer = BufWriter::new(f);
        body(&mut writer)?;
        writer.flush()
    });
    result.map_err(|source| InstanceError::Io { path, source })
}

fn write_list<W: Write>(writer: &mut W, ids: &[usize]) -> io::Result<()> {
    write!(writer, "{}", ids.len())?;
    for id in ids {
        write!(writer, " {}", id)?;
    }
    writeln!(writer)
}

/// Writes `instance` to `dir` in the directory format read by [`load_instance`]
pub fn write_instance<P: AsRef<Path>>(
    dir: P,
    instance: &WarehouseInstance,
) -> Result<(), InstanceError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|source| InstanceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    write_file(dir, DISTANCES_FILE, |w| {
        writeln!(w, "{}", instance.distances.size())?;
        for row in instance.distances.rows() {
            let row: Vec<String> = row.iter().map(|d| d.to_string()).collect();
            writeln!(w, "{}", row.join(" "))?;
        }
        Ok(())
    })?;
    write_file(dir, CAPACITIES_FILE, |w| {
        writeln!(w, "{}", instance.num_racks())?;
        for rack in &instance.racks {
            writeln!(w, "{}", rack.capacity)?;
        }
        Ok(())
    })?;
    write_file(dir, CIRCUITS_FILE, |w| {
        writeln!(w, "{}", instance.num_products())?;
        for product in &instance.products {
            writeln!(w, "{}", product.circuit)?;
        }
        Ok(())
    })?;
    write_file(dir, AISLES_FILE, |w| {
        writeln!(w, "{}", instance.num_aisles())?;
        for aisle in &instance.aisles {
            write_list(w, &aisle.racks)?;
        }
        Ok(())
    })?;
    write_file(dir, ORDERS_FILE, |w| {
        writeln!(w, "{}", instance.num_orders())?;
        for order in &instance.orders {
            write_list(w, &order.products)?;
        }
        Ok(())
    })?;

    let metadata = instance.metadata();
    write_file(dir, METADATA_FILE, |w| {
        writeln!(w, "{}", metadata.num_racks)?;
        writeln!(w, "{}", metadata.total_slots)?;
        writeln!(w, "{}", metadata.aeration_rate)?;
        writeln!(w, "{}", metadata.num_products)?;
        writeln!(w, "{}", metadata.num_circuits)?;
        writeln!(w, "{}", metadata.num_aisles)?;
        writeln!(w, "{}", metadata.num_orders)
    })?;

    debug!(dir = %dir.display(), "instance written");
    Ok(())
}
