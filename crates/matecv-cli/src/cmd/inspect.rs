// crates/matecv-cli/src/cmd/inspect.rs

use std::fmt::Debug;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use matecv_core::{Mate, Menu, Pmat, Property, Record, Texture};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input .mate, .menu or .pmat path
    #[arg(long)]
    pub r#in: PathBuf,
}

pub fn run(args: InspectArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.r#in).with_context(|| format!("reading {}", args.r#in.display()))?;
    let ext = args.r#in.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();

    println!("--- inspect ---");
    println!("file             = {}", args.r#in.display());
    println!("bytes            = {}", bytes.len());

    match ext.as_str() {
        "mate" => {
            let mate = Mate::parse(&bytes).context("parsing material")?;
            print_mate(&mate);
            check_roundtrip(&mate, &bytes)
        }
        "menu" => {
            let menu = Menu::parse(&bytes).context("parsing menu")?;
            print_menu(&menu)?;
            check_roundtrip(&menu, &bytes)
        }
        "pmat" => {
            let pmat = Pmat::parse(&bytes).context("parsing property map")?;
            print_pmat(&pmat);
            check_roundtrip(&pmat, &bytes)
        }
        other => bail!("unsupported extension {other:?} (expected mate, menu or pmat)"),
    }
}

fn print_mate(mate: &Mate) {
    let m = &mate.material;
    println!("version          = {}", mate.version);
    println!("mate_name        = {}", mate.mate_name);
    println!("material.name    = {}", m.name);
    println!("shader           = {}", m.shader);
    println!("shader_filename  = {}", m.shader_filename);
    println!("--- properties ({}) ---", m.properties.len());
    for p in &m.properties {
        match p {
            Property::Tex { name, texture } => match texture {
                Texture::Tex2d(f) | Texture::Cube(f) => {
                    println!("{:<4} {name} {} {} path={}", p.tag(), texture.kind(), f.name, f.path)
                }
                Texture::RenderTarget { name: rt, path } => {
                    println!("{:<4} {name} {} {rt} path={path}", p.tag(), texture.kind())
                }
                Texture::Null => println!("{:<4} {name} {}", p.tag(), texture.kind()),
            },
            Property::Color { name, value } | Property::Vector { name, value } => println!(
                "{:<4} {name} [{}, {}, {}, {}]",
                p.tag(),
                value.x,
                value.y,
                value.z,
                value.w
            ),
            Property::Float { name, value } => println!("{:<4} {name} {value}", p.tag()),
            Property::End => println!("{}", p.tag()),
        }
    }
}

fn print_menu(menu: &Menu) -> anyhow::Result<()> {
    println!("version          = {}", menu.version);
    println!("src_name         = {}", menu.src_name);
    println!("item_name        = {}", menu.item_name);
    println!("category         = {}", menu.category);
    println!("info_text        = {}", menu.info_text);
    println!("body_size        = {}", menu.body_size()?);
    println!("--- commands ({}) ---", menu.commands.len());
    for c in menu.commands.iter().filter(|c| !c.is_sentinel()) {
        println!("{}", c.args.join("\t"));
    }
    Ok(())
}

fn print_pmat(pmat: &Pmat) {
    println!("version          = {}", pmat.version);
    println!("hash             = {}", pmat.hash());
    println!("material_name    = {}", pmat.material_name);
    println!("render_queue     = {}", pmat.render_queue);
    match &pmat.shader {
        Some(s) => println!("shader           = {s}"),
        None => println!("shader           = (absent)"),
    }
}

/// Rebuild and reparse; the reparsed record must equal the parsed input.
fn check_roundtrip<R: Record + PartialEq + Debug>(rec: &R, bytes: &[u8]) -> anyhow::Result<()> {
    let rebuilt = rec.build().context("rebuilding")?;
    let reparsed = R::parse(&rebuilt).context("reparsing rebuilt bytes")?;
    let ok = &reparsed == rec;
    println!("roundtrip_ok     = {ok}");
    println!("bytes_identical  = {}", rebuilt == bytes);
    if !ok {
        bail!("rebuilt record differs: {reparsed:?}");
    }
    Ok(())
}
