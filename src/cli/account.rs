use anyhow::Result;

use crate::wallet::Wallet;

pub async fn balance(wallet: &Wallet) -> Result<()> {
    let balance = wallet.get_balance().await?;
    println!("Address: {}", wallet.address());
    println!("Network: {}", balance.network);
    println!("Balance: {} {}", balance.formatted, balance.currency);
    Ok(())
}

pub fn address(wallet: &Wallet) {
    println!("{}", wallet.address());
}
