//! rowstore CLI
//!
//! Command-line consumer of the storage engine: plays the role of the
//! query-processing layer for ad-hoc inspection and maintenance.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rowstore::{
    Column, ColumnType, CompareOp, Condition, Config, Result, Row, Schema, StorageEngine, Value,
};

/// rowstore CLI
#[derive(Parser, Debug)]
#[command(name = "rowstore-cli")]
#[command(about = "CLI for the rowstore table storage engine")]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./rowstore_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a table
    CreateTable {
        /// Table name
        name: String,

        /// Column list, e.g. "id:int,name:varchar(10),gpa:float"
        columns: String,
    },

    /// Drop a table and delete its data file
    DropTable {
        /// Table name
        name: String,
    },

    /// List registered tables
    Tables,

    /// Insert a row
    Insert {
        /// Table name
        name: String,

        /// One literal per column, in schema order
        values: Vec<String>,
    },

    /// Scan live rows
    Scan {
        /// Table name
        name: String,

        /// Conditions like "gpa>=3.0" (all must match)
        #[arg(short = 'w', long = "where")]
        conditions: Vec<String>,

        /// Comma-separated columns to print (projection is client-side)
        #[arg(short, long)]
        columns: Option<String>,
    },

    /// Delete rows matching conditions
    Delete {
        /// Table name
        name: String,

        /// Conditions like "id=123" (all must match)
        #[arg(short = 'w', long = "where")]
        conditions: Vec<String>,
    },

    /// Update rows matching conditions
    Update {
        /// Table name
        name: String,

        /// Assignments like "gpa=4.0"
        #[arg(short, long = "set")]
        set: Vec<String>,

        /// Conditions like "id=123" (all must match)
        #[arg(short = 'w', long = "where")]
        conditions: Vec<String>,
    },

    /// Rewrite a table file, discarding deleted rows
    Compact {
        /// Table name
        name: String,
    },

    /// Show table statistics
    Stats {
        /// Table name
        name: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let engine = StorageEngine::open(Config::builder().data_dir(args.data_dir).build())?;

    match args.command {
        Commands::CreateTable { name, columns } => {
            let schema = parse_schema(&columns)?;
            engine.create_table(&name, schema)?;
            println!("created table '{}'", name);
        }

        Commands::DropTable { name } => {
            engine.drop_table(&name)?;
            println!("dropped table '{}'", name);
        }

        Commands::Tables => {
            for table in engine.tables() {
                println!("{}", table);
            }
        }

        Commands::Insert { name, values } => {
            let schema = engine.schema(&name)?;
            let row = parse_row(&schema, &values)?;
            engine.open_table(&name)?;
            let location = engine.insert(&name, &row)?;
            engine.close_table(&name)?;
            println!("inserted at {}", location);
        }

        Commands::Scan {
            name,
            conditions,
            columns,
        } => {
            let schema = engine.schema(&name)?;
            let conditions = parse_conditions(&schema, &conditions)?;
            let projection = parse_projection(&schema, columns.as_deref())?;

            engine.open_table(&name)?;
            let rows = engine.scan_collect(&name, &conditions)?;
            engine.close_table(&name)?;

            for (location, row) in rows {
                let printed: Vec<String> = match &projection {
                    Some(indexes) => indexes.iter().map(|&i| row[i].to_string()).collect(),
                    None => row.iter().map(|v| v.to_string()).collect(),
                };
                println!("{}\t{}", location, printed.join("\t"));
            }
        }

        Commands::Delete { name, conditions } => {
            let schema = engine.schema(&name)?;
            let conditions = parse_conditions(&schema, &conditions)?;
            engine.open_table(&name)?;
            let affected = engine.delete_where(&name, &conditions)?;
            engine.close_table(&name)?;
            println!("{} row(s) deleted", affected);
        }

        Commands::Update {
            name,
            set,
            conditions,
        } => {
            let schema = engine.schema(&name)?;
            let assignments = parse_assignments(&schema, &set)?;
            let conditions = parse_conditions(&schema, &conditions)?;
            engine.open_table(&name)?;
            let affected = engine.update_where(&name, &assignments, &conditions)?;
            engine.close_table(&name)?;
            println!("{} row(s) updated", affected);
        }

        Commands::Compact { name } => {
            engine.open_table(&name)?;
            let discarded = engine.compact(&name)?;
            engine.close_table(&name)?;
            println!("compacted '{}': {} deleted row(s) discarded", name, discarded);
        }

        Commands::Stats { name } => {
            engine.open_table(&name)?;
            let stats = engine.table_stats(&name)?;
            engine.close_table(&name)?;
            println!("rows:           {}", stats.row_count);
            println!("blocks:         {}", stats.block_count);
            println!("row size:       {} bytes", stats.row_size);
            println!("rows per block: {}", stats.rows_per_block);
            println!("file size:      {} bytes", stats.file_size);
        }
    }

    Ok(())
}

// =============================================================================
// Argument Parsing Helpers
// =============================================================================

fn parse_schema(spec: &str) -> Result<Schema> {
    let mut columns = Vec::new();
    for part in spec.split(',') {
        let (name, ty) = part
            .split_once(':')
            .ok_or_else(|| invalid(format!("column spec '{}' is not name:type", part)))?;
        columns.push(Column::new(name.trim(), parse_type(ty.trim())?));
    }
    Schema::new(columns)
}

fn parse_type(spec: &str) -> Result<ColumnType> {
    let lower = spec.to_ascii_lowercase();
    if lower == "int" {
        return Ok(ColumnType::Int);
    }
    if lower == "float" {
        return Ok(ColumnType::Float);
    }
    if let Some(len) = parse_width(&lower, "char") {
        return Ok(ColumnType::Char(len?));
    }
    if let Some(max) = parse_width(&lower, "varchar") {
        return Ok(ColumnType::Varchar(max?));
    }
    Err(invalid(format!("unknown column type '{}'", spec)))
}

fn parse_width(spec: &str, keyword: &str) -> Option<Result<u16>> {
    let inner = spec
        .strip_prefix(keyword)?
        .strip_prefix('(')?
        .strip_suffix(')')?;
    Some(
        inner
            .parse::<u16>()
            .map_err(|_| invalid(format!("bad width in '{}'", spec))),
    )
}

fn parse_row(schema: &Schema, literals: &[String]) -> Result<Row> {
    if literals.len() != schema.column_count() {
        return Err(invalid(format!(
            "expected {} values, got {}",
            schema.column_count(),
            literals.len()
        )));
    }
    schema
        .columns()
        .iter()
        .zip(literals)
        .map(|(column, literal)| parse_value(&column.ty, literal))
        .collect()
}

fn parse_value(ty: &ColumnType, literal: &str) -> Result<Value> {
    match ty {
        ColumnType::Int => literal
            .parse()
            .map(Value::Int)
            .map_err(|_| invalid(format!("'{}' is not an INT", literal))),
        ColumnType::Float => literal
            .parse()
            .map(Value::Float)
            .map_err(|_| invalid(format!("'{}' is not a FLOAT", literal))),
        ColumnType::Char(_) => Ok(Value::Char(literal.to_string())),
        ColumnType::Varchar(_) => Ok(Value::Varchar(literal.to_string())),
    }
}

fn parse_conditions(schema: &Schema, specs: &[String]) -> Result<Vec<Condition>> {
    specs
        .iter()
        .map(|spec| parse_condition(schema, spec))
        .collect()
}

fn parse_condition(schema: &Schema, spec: &str) -> Result<Condition> {
    // Two-character operators must be tried first
    for op_str in ["<=", ">=", "<>", "!=", "=", "<", ">"] {
        if let Some((column, literal)) = spec.split_once(op_str) {
            let column = column.trim();
            let op: CompareOp = op_str.parse().map_err(invalid)?;
            let ty = column_type(schema, column)?;
            let operand = parse_value(&ty, literal.trim())?;
            return Ok(Condition::new(column, op, operand));
        }
    }
    Err(invalid(format!("condition '{}' has no operator", spec)))
}

fn parse_assignments(schema: &Schema, specs: &[String]) -> Result<Vec<(String, Value)>> {
    specs
        .iter()
        .map(|spec| {
            let (column, literal) = spec
                .split_once('=')
                .ok_or_else(|| invalid(format!("assignment '{}' is not column=value", spec)))?;
            let column = column.trim();
            let ty = column_type(schema, column)?;
            Ok((column.to_string(), parse_value(&ty, literal.trim())?))
        })
        .collect()
}

fn parse_projection(schema: &Schema, spec: Option<&str>) -> Result<Option<Vec<usize>>> {
    let Some(spec) = spec else {
        return Ok(None);
    };
    spec.split(',')
        .map(|name| {
            schema
                .column_index(name.trim())
                .ok_or_else(|| invalid(format!("unknown column '{}'", name.trim())))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn column_type(schema: &Schema, column: &str) -> Result<ColumnType> {
    schema
        .columns()
        .iter()
        .find(|c| c.name == column)
        .map(|c| c.ty.clone())
        .ok_or_else(|| invalid(format!("unknown column '{}'", column)))
}

fn invalid(message: impl Into<String>) -> rowstore::StoreError {
    rowstore::StoreError::SchemaMismatch(message.into())
}
